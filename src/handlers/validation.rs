//! # Claims Request Validation
//!
//! Checks the assertion claims in a claims request before an interaction is
//! started, so a client learns early which assertions cannot be evaluated.
//! Plain claims are not checked: unsupported claims are simply not resolved.

use std::future::Future;

use serde_json::Value;
use tracing::instrument;

use crate::assertion;
use crate::consent::Group;
use crate::endpoint::Handler;
use crate::provider::{Discovery, Metadata, Provider};
use crate::types::{ClaimRequestError, ValidationRequest, ValidationResponse};
use crate::{Result, invalid, server};

/// Claims request validation handler.
///
/// # Errors
///
/// Returns an `invalid_request` error if the claims request is not an object,
/// or a `server_error` if the provider is not available.
#[instrument(level = "debug", skip(provider))]
pub async fn validation(
    provider: impl Provider, request: ValidationRequest,
) -> Result<ValidationResponse> {
    let discovery = Metadata::discovery(&provider)
        .await
        .map_err(|e| server!("issue getting discovery metadata: {e}"))?;
    process(&discovery, &request)
}

impl Handler for ValidationRequest {
    type Response = ValidationResponse;

    fn handle(self, provider: &impl Provider) -> impl Future<Output = Result<Self::Response>> + Send {
        validation(provider.clone(), self)
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn user_id(&self) -> Option<&str> {
        None
    }
}

fn process(discovery: &Discovery, request: &ValidationRequest) -> Result<ValidationResponse> {
    tracing::debug!("validation::process");

    let claims = match &request.claims {
        Value::Null => return Ok(ValidationResponse::default()),
        Value::Object(claims) => claims,
        _ => return Err(invalid!("claims should be an object")),
    };

    let mut errors = vec![];
    for group in Group::ALL {
        let Some(assertion_claims) = claims
            .get(group.as_str())
            .and_then(|g| g.get("assertion_claims"))
            .and_then(Value::as_object)
        else {
            continue;
        };

        for (key, claim) in assertion_claims {
            let description = match discovery.claims_in_assertion_claims_supported.get(key) {
                None => Some("assertions not supported on this claim".to_string()),
                Some(schema) => {
                    let raw = claim.get("assertion").unwrap_or(&Value::Null);
                    assertion::compile(raw, Some(schema)).err().map(|e| e.to_string())
                }
            };

            if let Some(description) = description {
                errors.push(ClaimRequestError {
                    group: format!("{group}.assertion_claims"),
                    key: key.clone(),
                    description,
                });
            }
        }
    }

    Ok(ValidationResponse { errors })
}
