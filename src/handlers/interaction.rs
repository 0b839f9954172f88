//! # Interaction Endpoint
//!
//! Starts a consent interaction. The claims requested by the client are
//! narrowed to those the host supports, resolved for the authenticated user,
//! and recorded as a new consent awaiting the user's decision.
//!
//! Any previous consent between the client and user is replaced.

use std::future::Future;

use serde_json::Value;
use tracing::instrument;

use crate::consent::{Claims, Consent};
use crate::endpoint::Handler;
use crate::provider::{ClaimSource, ConsentStore, Discovery, Metadata, Provider};
use crate::types::{InteractionRequest, InteractionResponse};
use crate::{Result, server};

/// Interaction request handler.
///
/// # Errors
///
/// Returns an `invalid_request` error if the claims request is malformed, or
/// a `server_error` if the provider is not available.
#[instrument(level = "debug", skip(provider))]
pub async fn interaction(
    provider: impl Provider, request: InteractionRequest,
) -> Result<InteractionResponse> {
    let discovery = Metadata::discovery(&provider)
        .await
        .map_err(|e| server!("issue getting discovery metadata: {e}"))?;

    let ctx = Context { discovery };
    let claims = ctx.verify(&request)?;
    ctx.process(&provider, request, claims).await
}

impl Handler for InteractionRequest {
    type Response = InteractionResponse;

    fn handle(self, provider: &impl Provider) -> impl Future<Output = Result<Self::Response>> + Send {
        interaction(provider.clone(), self)
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
    discovery: Discovery,
}

impl Context {
    // Parse the claims request, dropping anything unsupported.
    fn verify(&self, request: &InteractionRequest) -> Result<Claims> {
        tracing::debug!("interaction::verify");

        let claims = match &request.claims {
            None | Some(Value::Null) => Claims::default(),
            Some(value) => Claims::from_value(value)?,
        };

        Ok(claims.retain_supported(
            &self.discovery.claims_supported,
            &self.discovery.claims_in_assertion_claims_supported,
        ))
    }

    // Resolve requested claims and record the consent.
    async fn process(
        &self, provider: &impl Provider, request: InteractionRequest, claims: Claims,
    ) -> Result<InteractionResponse> {
        tracing::debug!("interaction::process");

        let claim_request = claims.claim_request();
        let response = ClaimSource::resolve(provider, &request.user_id, &claim_request)
            .await
            .map_err(|e| server!("issue resolving claims: {e}"))?;

        let claims =
            claims.with_outcomes(&response, &self.discovery.claims_in_assertion_claims_supported);
        let scopes = request.scope.split_whitespace().map(ToString::to_string).collect();

        let consent = Consent::new(request.client_id, request.user_id, claims, scopes);
        ConsentStore::save(provider, &consent)
            .await
            .map_err(|e| server!("issue saving consent: {e}"))?;

        Ok(InteractionResponse {
            consent_id: consent.id(),
            claims: consent.claims,
            scopes: consent.scopes,
        })
    }
}
