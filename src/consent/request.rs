//! Claims requested by a relying party, and the outcomes attached to them
//! once resolved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ConsentError, Group};
use crate::aggregator::ClaimRequest;
use crate::assertion::{self, Schema};
use crate::resolved::{Claim, ClaimResponse, Ial, Unresolved};

/// An `OpenID` claims request, split into `id_token` and `userinfo` groups.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Claims {
    /// Why the claims are requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Claims to be released in the ID token.
    #[serde(default)]
    pub id_token: ClaimGroup,

    /// Claims to be released from the userinfo endpoint.
    #[serde(default)]
    pub userinfo: ClaimGroup,
}

/// Plain and assertion claims requested for one release target.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ClaimGroup {
    /// Why the group is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Questions asked about claim values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assertion_claims: BTreeMap<String, AssertionClaim>,

    /// Claims requested by name.
    #[serde(flatten)]
    pub claims: BTreeMap<String, RequestedClaim>,
}

/// A claim requested by name.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RequestedClaim {
    /// Why the claim is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Whether the claim is essential to the relying party.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,

    /// Minimum identity assurance level acceptable for released values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ial: Option<Ial>,

    /// A specific value requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// A set of values requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,

    /// Resolved values meeting `ial`, set once the claim is resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Claim>,
}

impl RequestedClaim {
    /// The requested assurance level, 1 when not specified.
    #[must_use]
    pub fn ial(&self) -> Ial {
        self.ial.unwrap_or_default()
    }
}

/// A question asked about a claim value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AssertionClaim {
    /// Why the assertion is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Minimum identity assurance level of values the assertion is
    /// evaluated against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ial: Option<Ial>,

    /// The raw assertion expression.
    #[serde(default)]
    pub assertion: Value,

    /// Values matching the assertion, set once the claim is resolved.
    /// Compile failures are recorded as unresolved markers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Claim>,
}

impl AssertionClaim {
    /// The requested assurance level, 1 when not specified.
    #[must_use]
    pub fn ial(&self) -> Ial {
        self.ial.unwrap_or_default()
    }
}

impl Claims {
    /// Parse and validate a claims request.
    ///
    /// # Errors
    ///
    /// Returns `ConsentError::Malformed` describing the first invalid
    /// element.
    pub fn from_value(value: &Value) -> Result<Self, ConsentError> {
        let Some(object) = value.as_object() else {
            return Err(malformed("claims should be an object"));
        };

        Ok(Self {
            purpose: optional_string(object.get("purpose"), "purpose should be a string")?,
            id_token: ClaimGroup::from_value(object.get("id_token"))?,
            userinfo: ClaimGroup::from_value(object.get("userinfo"))?,
        })
    }

    /// The claims requested for `group`.
    #[must_use]
    pub const fn group(&self, group: Group) -> &ClaimGroup {
        match group {
            Group::IdToken => &self.id_token,
            Group::Userinfo => &self.userinfo,
        }
    }

    /// Returns `true` once every requested claim carries an outcome.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.id_token.is_resolved() && self.userinfo.is_resolved()
    }

    /// Drop claims not listed in `claims_supported` and assertion claims
    /// without a schema.
    #[must_use]
    pub fn retain_supported(
        &self, claims_supported: &[String], schemas: &BTreeMap<String, Schema>,
    ) -> Self {
        let retain = |group: &ClaimGroup| ClaimGroup {
            purpose: group.purpose.clone(),
            assertion_claims: group
                .assertion_claims
                .iter()
                .filter(|(name, _)| schemas.contains_key(*name))
                .map(|(name, claim)| (name.clone(), claim.clone()))
                .collect(),
            claims: group
                .claims
                .iter()
                .filter(|(name, _)| claims_supported.contains(*name))
                .map(|(name, claim)| (name.clone(), claim.clone()))
                .collect(),
        };

        Self {
            purpose: self.purpose.clone(),
            id_token: retain(&self.id_token),
            userinfo: retain(&self.userinfo),
        }
    }

    /// A single request covering both groups and their assertion claims.
    /// A name requested more than once is requested at its lowest level.
    #[must_use]
    pub fn claim_request(&self) -> ClaimRequest {
        let mut request = ClaimRequest::new();
        for group in [&self.id_token, &self.userinfo] {
            for (name, claim) in &group.claims {
                request.require(name, claim.ial());
            }
            for (name, claim) in &group.assertion_claims {
                request.require(name, claim.ial());
            }
        }
        request
    }

    /// Attach outcomes from `response` to every requested claim.
    ///
    /// Plain claims keep the values meeting their own assurance level.
    /// Assertion claims keep the values meeting their assurance level that
    /// also match the assertion, compiled with the claim's schema.
    #[must_use]
    pub fn with_outcomes(&self, response: &ClaimResponse, schemas: &BTreeMap<String, Schema>) -> Self {
        Self {
            purpose: self.purpose.clone(),
            id_token: self.id_token.with_outcomes(response, schemas),
            userinfo: self.userinfo.with_outcomes(response, schemas),
        }
    }
}

impl ClaimGroup {
    fn from_value(value: Option<&Value>) -> Result<Self, ConsentError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(Self::default());
        };
        let Some(object) = value.as_object() else {
            return Err(malformed("group should be an object"));
        };

        let mut group = Self::default();
        for (key, value) in object {
            match key.as_str() {
                "purpose" => {
                    group.purpose = optional_string(Some(value), "purpose should be a string")?;
                }
                "assertion_claims" => group.assertion_claims = assertion_claims(value)?,
                _ => {
                    group.claims.insert(key.clone(), RequestedClaim::from_value(value)?);
                }
            }
        }
        Ok(group)
    }

    fn is_resolved(&self) -> bool {
        self.claims.values().all(|c| c.outcome.is_some())
            && self.assertion_claims.values().all(|c| c.outcome.is_some())
    }

    fn with_outcomes(&self, response: &ClaimResponse, schemas: &BTreeMap<String, Schema>) -> Self {
        let claims = self
            .claims
            .iter()
            .map(|(name, claim)| {
                let outcome =
                    response.get(name).map_or_else(Claim::not_found, |c| c.filter_by_ial(claim.ial()));
                let claim = RequestedClaim {
                    outcome: Some(outcome),
                    ..claim.clone()
                };
                (name.clone(), claim)
            })
            .collect();

        let assertion_claims = self
            .assertion_claims
            .iter()
            .map(|(name, claim)| {
                let candidates =
                    response.get(name).map_or_else(Claim::not_found, |c| c.filter_by_ial(claim.ial()));

                let outcome = match assertion::compile(&claim.assertion, schemas.get(name)) {
                    Ok(predicate) => candidates.retain_matching(|v| predicate.matches(v)),
                    Err(e) => {
                        tracing::debug!("assertion on {name} failed to compile: {e}");
                        let mut unresolved = vec![Unresolved::new(e.kind())];
                        unresolved.extend(candidates.unresolved);
                        Claim::new(vec![], unresolved)
                    }
                };

                let claim = AssertionClaim {
                    outcome: Some(outcome),
                    ..claim.clone()
                };
                (name.clone(), claim)
            })
            .collect();

        Self {
            purpose: self.purpose.clone(),
            assertion_claims,
            claims,
        }
    }
}

impl RequestedClaim {
    fn from_value(value: &Value) -> Result<Self, ConsentError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let Some(object) = value.as_object() else {
            return Err(malformed("claim should be an object or null"));
        };

        let values = match object.get("values") {
            None => None,
            Some(Value::Array(values)) => Some(values.clone()),
            Some(_) => return Err(malformed("values should be an array")),
        };
        let essential = match object.get("essential") {
            None => None,
            Some(Value::Bool(essential)) => Some(*essential),
            Some(_) => return Err(malformed("essential should be a boolean")),
        };

        Ok(Self {
            purpose: optional_string(object.get("purpose"), "purpose should be a string")?,
            essential,
            ial: optional_ial(object)?,
            value: object.get("value").cloned(),
            values,
            outcome: None,
        })
    }
}

impl AssertionClaim {
    fn from_value(value: &Value) -> Result<Self, ConsentError> {
        let Some(object) = value.as_object() else {
            return Err(malformed("assertion claim should be an object"));
        };

        Ok(Self {
            purpose: optional_string(object.get("purpose"), "purpose should be a string")?,
            ial: optional_ial(object)?,
            assertion: object.get("assertion").cloned().unwrap_or_default(),
            outcome: None,
        })
    }
}

fn assertion_claims(value: &Value) -> Result<BTreeMap<String, AssertionClaim>, ConsentError> {
    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(object) => object
            .iter()
            .map(|(name, claim)| Ok((name.clone(), AssertionClaim::from_value(claim)?)))
            .collect(),
        _ => Err(malformed("assertion_claims should be an object")),
    }
}

fn optional_string(value: Option<&Value>, message: &str) -> Result<Option<String>, ConsentError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(malformed(message)),
    }
}

fn optional_ial(object: &Map<String, Value>) -> Result<Option<Ial>, ConsentError> {
    let Some(value) = object.get("ial") else {
        return Ok(None);
    };
    value
        .as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .and_then(|n| Ial::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| malformed("ial should be 1, 2 or 3"))
}

fn malformed(message: &str) -> ConsentError {
    ConsentError::Malformed(message.to_string())
}
