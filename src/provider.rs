//! # Provider
//!
//! Traits implemented by the host application to supply configuration, claim
//! values, and consent storage to the library.

use std::collections::BTreeMap;
use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::aggregator::ClaimRequest;
use crate::assertion::Schema;
use crate::consent::Consent;
use crate::resolved::ClaimResponse;

/// Provider trait.
pub trait Provider: Metadata + ClaimSource + ConsentStore + Clone {}

/// The `Metadata` trait is used by implementers to provide claim discovery
/// configuration to the library.
pub trait Metadata: Send + Sync {
    /// Claims and assertion schemas the host supports.
    fn discovery(&self) -> impl Future<Output = Result<Discovery>> + Send;
}

/// `ClaimSource` resolves claim values for a subject. [`Aggregator`] is the
/// usual implementation.
///
/// [`Aggregator`]: crate::aggregator::Aggregator
pub trait ClaimSource: Send + Sync {
    /// Resolve `request` for the subject identified by `subject_id`. Every
    /// requested claim should be present in the response.
    fn resolve(
        &self, subject_id: &str, request: &ClaimRequest,
    ) -> impl Future<Output = Result<ClaimResponse>> + Send;
}

/// `ConsentStore` is used to store and retrieve consents between requests.
pub trait ConsentStore: Send + Sync {
    /// Retrieve the consent matching `filter`, if any.
    fn find_one(
        &self, filter: &ConsentFilter,
    ) -> impl Future<Output = Result<Option<Consent>>> + Send;

    /// Store `consent`, replacing any consent with the same id.
    fn save(&self, consent: &Consent) -> impl Future<Output = Result<()>> + Send;
}

/// Claim discovery configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Discovery {
    /// Claims that may be requested.
    #[serde(default)]
    pub claims_supported: Vec<String>,

    /// Claims that assertions may be made about, each with the schema used
    /// to compile assertions.
    #[serde(default)]
    pub claims_in_assertion_claims_supported: BTreeMap<String, Schema>,
}

/// Identifies a consent by its client and subject.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConsentFilter {
    /// The client the consent was given to.
    pub client_id: String,

    /// The subject who gave consent.
    pub user_id: String,
}

impl ConsentFilter {
    /// Filter for the consent given by `user_id` to `client_id`.
    #[must_use]
    pub fn new(client_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Returns `true` if `consent` matches the filter.
    #[must_use]
    pub fn matches(&self, consent: &Consent) -> bool {
        consent.client_id == self.client_id && consent.user_id == self.user_id
    }
}
