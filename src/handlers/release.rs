//! # Release Endpoint
//!
//! Returns the claims the user agreed to release for the ID token or the
//! userinfo endpoint. Used by the token issuer once consent is accepted.

use std::future::Future;

use tracing::instrument;

use crate::endpoint::Handler;
use crate::provider::{ConsentFilter, ConsentStore, Provider};
use crate::types::{ReleaseRequest, ReleaseResponse};
use crate::{Error, Result, server};

/// Release request handler.
///
/// # Errors
///
/// Returns an `illegal_state` error if the user has not accepted a consent
/// for the client, or a `server_error` if the provider is not available.
#[instrument(level = "debug", skip(provider))]
pub async fn release(provider: impl Provider, request: ReleaseRequest) -> Result<ReleaseResponse> {
    process(&provider, request).await
}

impl Handler for ReleaseRequest {
    type Response = ReleaseResponse;

    fn handle(self, provider: &impl Provider) -> impl Future<Output = Result<Self::Response>> + Send {
        release(provider.clone(), self)
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn user_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

async fn process(provider: &impl Provider, request: ReleaseRequest) -> Result<ReleaseResponse> {
    tracing::debug!("release::process");

    let filter = ConsentFilter::new(request.client_id, request.user_id);
    let Some(consent) = ConsentStore::find_one(provider, &filter)
        .await
        .map_err(|e| server!("issue retrieving consent: {e}"))?
    else {
        return Err(Error::IllegalState("no consent found".into()));
    };

    Ok(ReleaseResponse {
        claims: consent.claims_for(request.group)?,
    })
}
