//! # Endpoint
//!
//! `Endpoint` provides the entry point for interaction requests. Requests are
//! routed to the appropriate handler for processing, returning a response that
//! can be serialized to a JSON object.

use std::fmt::Debug;
use std::future::Future;

use crate::provider::Provider;
use crate::{Result, invalid};

/// Handle incoming requests.
///
/// # Errors
///
/// This method can fail for a number of reasons related to the incoming
/// request's viability. Expected failures include missing parties, malformed
/// claims requests or decisions, and consents in the wrong state.
///
/// Implementers should look to the Error type and description for more
/// information on the reason for failure.
pub async fn handle<T>(request: impl Handler<Response = T>, provider: &impl Provider) -> Result<T> {
    request.validate(provider).await?;
    request.handle(provider).await
}

/// Methods common to all requests.
///
/// The primary role of this trait is to provide a common interface for
/// requests so they can be handled by [`handle`] method.
pub trait Handler: Clone + Debug + Send + Sync {
    /// The inner response type specific to the implementing request.
    type Response;

    /// Routes the request to the concrete handler used to process it.
    fn handle(self, provider: &impl Provider) -> impl Future<Output = Result<Self::Response>> + Send;

    /// The client the request is made on behalf of.
    fn client_id(&self) -> &str;

    /// The subject the request concerns, if any.
    fn user_id(&self) -> Option<&str>;

    /// Perform initial validation of the request.
    ///
    /// Validation undertaken here is common to all requests, with request-
    /// specific validation performed by the request's handler.
    fn validate(&self, _provider: &impl Provider) -> impl Future<Output = Result<()>> + Send {
        async {
            if self.client_id().is_empty() {
                return Err(invalid!("no `client_id` specified"));
            }
            if self.user_id().is_some_and(str::is_empty) {
                return Err(invalid!("no `user_id` specified"));
            }
            Ok(())
        }
    }
}
