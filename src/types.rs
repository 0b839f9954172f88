//! # Types
//!
//! Request and response types for the interaction handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consent::{Claims, Group};

/// Request to start a consent interaction for the claims a client requested
/// about an authenticated user.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct InteractionRequest {
    /// The client requesting claims.
    pub client_id: String,

    /// The authenticated user.
    pub user_id: String,

    /// The `OpenID` claims request parameter, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Value>,

    /// Space-delimited requested scopes.
    #[serde(default)]
    pub scope: String,
}

/// Claims and scopes presented to the user for consent.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct InteractionResponse {
    /// Identifies the consent awaiting a decision.
    pub consent_id: String,

    /// Supported claims requested, with resolved outcomes.
    pub claims: Claims,

    /// Requested scopes.
    pub scopes: Vec<String>,
}

/// The user's consent decision.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConsentRequest {
    /// The client claims are released to.
    pub client_id: String,

    /// The user making the decision.
    pub user_id: String,

    /// The decision payload submitted by the user agent.
    pub decision: Value,
}

/// Outcome of a consent decision.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConsentResponse {
    /// Identifies the accepted consent.
    pub consent_id: String,

    /// Scopes the user approved.
    pub approved_scopes: Vec<String>,
}

/// Request for the claims released to a client.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReleaseRequest {
    /// The client claims are released to.
    pub client_id: String,

    /// The user the claims describe.
    pub user_id: String,

    /// Where the claims will be released.
    pub group: Group,
}

/// Claims released to a client.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ReleaseResponse {
    /// Released claims, keyed by claim name.
    pub claims: Value,
}

/// Request to check a claims request before an interaction starts.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ValidationRequest {
    /// The client making the claims request.
    pub client_id: String,

    /// The `OpenID` claims request parameter.
    pub claims: Value,
}

/// Problems found in a claims request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ValidationResponse {
    /// One entry per assertion claim that cannot be evaluated.
    pub errors: Vec<ClaimRequestError>,
}

/// An assertion claim that cannot be evaluated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClaimRequestError {
    /// Location of the assertion claim, e.g. `userinfo.assertion_claims`.
    pub group: String,

    /// The claim name.
    pub key: String,

    /// Why the assertion cannot be evaluated.
    pub description: String,
}
