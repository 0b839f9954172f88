//! # Consent
//!
//! A [`Consent`] records one subject/client claim negotiation: the claims the
//! client requested, the outcomes resolved for them, and the values the
//! subject chose to release.
//!
//! A consent moves through three states, each transition producing a new
//! value:
//!
//! ```text
//! PENDING --(outcomes attached)--> RESOLVED --(resolve)--> ACCEPTED
//! ```
//!
//! An accepted consent is final. Its selections are checked against the
//! resolved outcomes so that only values actually resolved can be released.

mod accepted;
mod request;

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

pub use self::accepted::{Accepted, AcceptedGroup, Selection};
pub use self::request::{AssertionClaim, ClaimGroup, Claims, RequestedClaim};
use crate::resolved::UnresolvedKind;

/// Consent integrity and lifecycle errors.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ConsentError {
    /// A selection names a claim that was not requested.
    #[error("{name} could not be accepted as it has not been requested at {at}")]
    NotRequested {
        /// Where the claim was expected.
        at: String,
        /// The claim name.
        name: String,
    },

    /// A selection points past the claim's resolved values.
    #[error("index {index} is not valid for {name} claim at {at}")]
    InvalidIndex {
        /// The group the claim belongs to.
        at: String,
        /// The claim name.
        name: String,
        /// The selected index.
        index: i64,
    },

    /// A request or decision payload is malformed.
    #[error("{0}")]
    Malformed(String),

    /// The consent has already been accepted.
    #[error("consent has already been accepted")]
    AlreadyAccepted,

    /// The consent's claims have not been resolved.
    #[error("consent cannot be accepted before its claims are resolved")]
    NotResolved,

    /// The consent has not been accepted.
    #[error("consent has not been accepted")]
    NotAccepted,
}

impl ConsentError {
    /// Returns `true` for errors caused by the consent's state rather than by
    /// the request.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyAccepted | Self::NotResolved | Self::NotAccepted)
    }
}

/// Release target for a group of claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    /// Claims released in the ID token.
    IdToken,

    /// Claims released from the userinfo endpoint.
    Userinfo,
}

impl Group {
    /// Both groups, in release order.
    pub const ALL: [Self; 2] = [Self::IdToken, Self::Userinfo];

    /// The group's name in claims requests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IdToken => "id_token",
            Self::Userinfo => "userinfo",
        }
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consent lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Claims requested, outcomes not yet attached.
    Pending,

    /// Outcomes attached, awaiting the subject's decision.
    Resolved,

    /// The subject's decision has been recorded.
    Accepted,
}

/// A subject's consent to release claims to a client.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Consent {
    /// The client the claims are released to.
    pub client_id: String,

    /// The subject the claims describe.
    pub user_id: String,

    /// Requested claims, with outcomes once resolved.
    pub claims: Claims,

    /// Requested scopes.
    pub scopes: Vec<String>,

    /// The subject's decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<Accepted>,
}

impl Consent {
    /// Create a consent for `claims` requested by `client_id` about `user_id`.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>, user_id: impl Into<String>, claims: Claims, scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: user_id.into(),
            claims,
            scopes,
            accepted: None,
        }
    }

    /// Identifier unique to the subject/client pair.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}$${}", self.user_id, self.client_id)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> Status {
        if self.accepted.is_some() {
            Status::Accepted
        } else if self.claims.is_resolved() {
            Status::Resolved
        } else {
            Status::Pending
        }
    }

    /// Record the subject's decision, returning the accepted consent.
    ///
    /// Every selection must name a requested claim and, for plain claims,
    /// point at one of its resolved values.
    ///
    /// # Errors
    ///
    /// Returns a `ConsentError` if the consent is not awaiting a decision or a
    /// selection is invalid. `self` is unchanged.
    pub fn resolve(&self, accepted: Accepted) -> Result<Self, ConsentError> {
        match self.status() {
            Status::Accepted => return Err(ConsentError::AlreadyAccepted),
            Status::Pending => return Err(ConsentError::NotResolved),
            Status::Resolved => {}
        }

        for group in Group::ALL {
            self.validate(group, accepted.group(group))?;
        }

        Ok(Self {
            accepted: Some(accepted),
            ..self.clone()
        })
    }

    fn validate(&self, group: Group, selected: &AcceptedGroup) -> Result<(), ConsentError> {
        let requested = self.claims.group(group);

        for (name, selection) in &selected.claims {
            let Some(claim) = requested.claims.get(name) else {
                return Err(ConsentError::NotRequested {
                    at: group.to_string(),
                    name: name.clone(),
                });
            };
            let Some(index) = selection.index() else {
                continue;
            };
            let available = claim.outcome.as_ref().map_or(0, |o| o.resolved.len());
            if index >= available {
                return Err(ConsentError::InvalidIndex {
                    at: group.to_string(),
                    name: name.clone(),
                    index: (*selection).into(),
                });
            }
        }

        // assertion selections only release the result, not a value
        for name in selected.assertions.keys() {
            if !requested.assertion_claims.contains_key(name) {
                return Err(ConsentError::NotRequested {
                    at: format!("{group} assertions"),
                    name: name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Claims released for `group`: the subject identifier, each selected
    /// value, and the result of each accepted assertion.
    ///
    /// # Errors
    ///
    /// Returns `ConsentError::NotAccepted` if no decision has been recorded.
    pub fn claims_for(&self, group: Group) -> Result<Value, ConsentError> {
        let Some(accepted) = &self.accepted else {
            return Err(ConsentError::NotAccepted);
        };
        let selected = accepted.group(group);
        let requested = self.claims.group(group);

        let mut released = Map::new();
        released.insert("sub".into(), Value::String(self.user_id.clone()));

        for (name, selection) in &selected.claims {
            let value = selection.index().and_then(|index| {
                let outcome = requested.claims.get(name)?.outcome.as_ref()?;
                outcome.resolved.get(index).map(|r| r.value.clone())
            });
            if let Some(value) = value {
                released.insert(name.clone(), value);
            }
        }

        if !selected.assertions.is_empty() {
            let mut results = Map::new();
            for (name, selection) in &selected.assertions {
                let Some(outcome) = requested.assertion_claims.get(name).and_then(|c| c.outcome.as_ref())
                else {
                    continue;
                };

                let failed = [UnresolvedKind::UnknownOperator, UnresolvedKind::SyntaxError]
                    .into_iter()
                    .find(|kind| outcome.has_unresolved(*kind));

                if let Some(kind) = failed {
                    results.insert(name.clone(), json!({"result": null, "error": kind}));
                } else if selection.index().is_some() {
                    results.insert(name.clone(), json!({"result": !outcome.resolved.is_empty()}));
                }
            }
            released.insert("assertion_claims".into(), Value::Object(results));
        }

        Ok(Value::Object(released))
    }
}
