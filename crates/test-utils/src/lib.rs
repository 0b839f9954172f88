//! # Test Utilities
//!
//! Hard-coded provider and resolver implementations that can be used for
//! testing.
//!
//! This crate provides common utilities for the project and is not intended
//! to be used directly.

pub mod resolvers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

use anyhow::Result;
use credibil_claims::aggregator::{Aggregator, ClaimRequest, Resolver};
use credibil_claims::consent::Consent;
use credibil_claims::provider::{
    ClaimSource, ConsentFilter, ConsentStore, Discovery, Metadata, Provider,
};
use credibil_claims::resolved::ClaimResponse;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub use self::resolvers::{FailingResolver, StaticResolver};

pub const CLIENT_ID: &str = "96bfb9cb-0513-7d64-5532-bed74c48f9ab";
pub const NORMAL_USER: &str = "normal_user";
pub const UNKNOWN_USER: &str = "unknown_user";

// initalise tracing once for all tests
static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// # Panics
///
/// Panics if the tracing subscriber cannot be set.
pub fn init_tracer() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        tracing::subscriber::set_global_default(subscriber).expect("subscriber set");
    });
}

/// Discovery metadata used by [`ProviderImpl`].
///
/// # Panics
///
/// Panics if the fixture cannot be deserialized.
#[must_use]
pub fn discovery() -> Discovery {
    serde_json::from_slice(include_bytes!("../data/discovery.json")).expect("should deserialize")
}

#[derive(Clone, Debug)]
pub struct ProviderImpl {
    discovery: Discovery,
    aggregator: Aggregator,
    consents: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl Default for ProviderImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderImpl {
    /// A provider backed by the fixture resolvers.
    #[must_use]
    pub fn new() -> Self {
        let resolvers = resolvers::fixtures().into_iter().map(|r| Arc::new(r) as Arc<dyn Resolver>);
        Self::with_resolvers(resolvers.collect())
    }

    /// A provider backed by `resolvers`.
    ///
    /// # Panics
    ///
    /// Panics if a resolver advertises invalid capabilities.
    #[must_use]
    pub fn with_resolvers(resolvers: Vec<Arc<dyn Resolver>>) -> Self {
        Self {
            discovery: discovery(),
            aggregator: Aggregator::new(resolvers).expect("should build aggregator"),
            consents: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Provider for ProviderImpl {}

impl Metadata for ProviderImpl {
    async fn discovery(&self) -> Result<Discovery> {
        Ok(self.discovery.clone())
    }
}

impl ClaimSource for ProviderImpl {
    async fn resolve(&self, subject_id: &str, request: &ClaimRequest) -> Result<ClaimResponse> {
        ClaimSource::resolve(&self.aggregator, subject_id, request).await
    }
}

impl ConsentStore for ProviderImpl {
    async fn find_one(&self, filter: &ConsentFilter) -> Result<Option<Consent>> {
        let key = format!("{}$${}", filter.user_id, filter.client_id);
        let Some(consent) = self.consents.lock().expect("should lock").get(&key).cloned() else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&consent)?))
    }

    async fn save(&self, consent: &Consent) -> Result<()> {
        let data = serde_json::to_vec(consent)?;
        self.consents.lock().expect("should lock").insert(consent.id(), data);
        Ok(())
    }
}
