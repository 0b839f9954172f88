//! # Consent Endpoint
//!
//! Records the user's decision against the consent created by the
//! interaction endpoint. The decision selects, per claim, which resolved
//! value may be released, or declines the claim.

use std::future::Future;

use tracing::instrument;

use crate::consent::{Accepted, Consent};
use crate::endpoint::Handler;
use crate::provider::{ConsentFilter, ConsentStore, Provider};
use crate::types::{ConsentRequest, ConsentResponse};
use crate::{Error, Result, server};

/// Consent request handler.
///
/// # Errors
///
/// Returns an `illegal_state` error if no consent is awaiting a decision, an
/// `invalid_request` error if the decision is malformed or selects values
/// that were not resolved, or a `server_error` if the provider is not
/// available.
#[instrument(level = "debug", skip(provider))]
pub async fn consent(provider: impl Provider, request: ConsentRequest) -> Result<ConsentResponse> {
    let filter = ConsentFilter::new(&request.client_id, &request.user_id);
    let Some(consent) = ConsentStore::find_one(&provider, &filter)
        .await
        .map_err(|e| server!("issue retrieving consent: {e}"))?
    else {
        return Err(Error::IllegalState("consent cannot be resolved before request".into()));
    };

    let ctx = Context { consent };
    let accepted = ctx.verify(&request)?;
    ctx.process(&provider, accepted).await
}

impl Handler for ConsentRequest {
    type Response = ConsentResponse;

    fn handle(self, provider: &impl Provider) -> impl Future<Output = Result<Self::Response>> + Send {
        consent(provider.clone(), self)
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn user_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

#[derive(Debug)]
struct Context {
    consent: Consent,
}

impl Context {
    fn verify(&self, request: &ConsentRequest) -> Result<Accepted> {
        tracing::debug!("consent::verify");
        Ok(Accepted::from_value(&request.decision)?)
    }

    async fn process(&self, provider: &impl Provider, accepted: Accepted) -> Result<ConsentResponse> {
        tracing::debug!("consent::process");

        let approved_scopes = accepted.approved_scopes.clone();
        let updated = self.consent.resolve(accepted)?;

        ConsentStore::save(provider, &updated)
            .await
            .map_err(|e| server!("issue saving consent: {e}"))?;

        Ok(ConsentResponse {
            consent_id: updated.id(),
            approved_scopes,
        })
    }
}
