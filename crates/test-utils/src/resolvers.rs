//! In-memory claim resolvers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use credibil_claims::aggregator::{ClaimRequest, Resolver};
use credibil_claims::resolved::{Claim, ClaimResponse, Ial, Resolved};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

/// Resolvers described by `data/resolvers.json`.
///
/// # Panics
///
/// Panics if the fixture cannot be deserialized.
#[must_use]
pub fn fixtures() -> Vec<StaticResolver> {
    serde_json::from_slice(include_bytes!("../data/resolvers.json")).expect("should deserialize")
}

/// A resolver answering from fixed data, recording each request it receives.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StaticResolver {
    #[serde(default)]
    pub name: String,
    capabilities: BTreeMap<String, u8>,

    // subject -> claim -> values
    #[serde(default)]
    subjects: BTreeMap<String, BTreeMap<String, Vec<Resolved>>>,

    #[serde(skip)]
    delay: Option<Duration>,
    #[serde(skip)]
    verbatim: bool,
    #[serde(skip)]
    calls: Arc<Mutex<Vec<ClaimRequest>>>,
}

impl StaticResolver {
    #[must_use]
    pub fn new<'a>(name: &str, capabilities: impl IntoIterator<Item = (&'a str, u8)>) -> Self {
        Self {
            name: name.to_string(),
            capabilities: capabilities.into_iter().map(|(c, ial)| (c.to_string(), ial)).collect(),
            ..Self::default()
        }
    }

    /// Add a value for `claim` about `subject`.
    #[must_use]
    pub fn with_value(
        mut self, subject: &str, claim: &str, value: impl Into<Value>, ial: Ial,
    ) -> Self {
        self.subjects
            .entry(subject.to_string())
            .or_default()
            .entry(claim.to_string())
            .or_default()
            .push(Resolved::new(value, ial));
        self
    }

    /// Wait before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer with every claim held for the subject, whatever was requested.
    #[must_use]
    pub const fn verbatim(mut self) -> Self {
        self.verbatim = true;
        self
    }

    /// Requests received so far.
    ///
    /// # Panics
    ///
    /// Panics if the call log is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<ClaimRequest> {
        self.calls.lock().expect("should lock").clone()
    }
}

impl Resolver for StaticResolver {
    fn capabilities(&self) -> BTreeMap<String, u8> {
        self.capabilities.clone()
    }

    fn resolve<'a>(
        &'a self, subject_id: &'a str, request: &'a ClaimRequest,
    ) -> BoxFuture<'a, anyhow::Result<ClaimResponse>> {
        Box::pin(async move {
            self.calls.lock().expect("should lock").push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let empty = BTreeMap::new();
            let held = self.subjects.get(subject_id).unwrap_or(&empty);

            if self.verbatim {
                return Ok(held
                    .iter()
                    .map(|(name, values)| (name.as_str(), Claim::from_resolved(values.clone())))
                    .collect());
            }

            Ok(request
                .names()
                .map(|name| {
                    let claim = held
                        .get(name)
                        .map_or_else(Claim::not_found, |values| Claim::from_resolved(values.clone()));
                    (name, claim)
                })
                .collect())
        })
    }
}

/// A resolver that always fails.
#[derive(Clone, Debug, Default)]
pub struct FailingResolver {
    capabilities: BTreeMap<String, u8>,
    calls: Arc<Mutex<Vec<ClaimRequest>>>,
}

impl FailingResolver {
    #[must_use]
    pub fn new<'a>(capabilities: impl IntoIterator<Item = (&'a str, u8)>) -> Self {
        Self {
            capabilities: capabilities.into_iter().map(|(c, ial)| (c.to_string(), ial)).collect(),
            calls: Arc::default(),
        }
    }

    /// Requests received so far.
    ///
    /// # Panics
    ///
    /// Panics if the call log is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<ClaimRequest> {
        self.calls.lock().expect("should lock").clone()
    }
}

impl Resolver for FailingResolver {
    fn capabilities(&self) -> BTreeMap<String, u8> {
        self.capabilities.clone()
    }

    fn resolve<'a>(
        &'a self, _: &'a str, request: &'a ClaimRequest,
    ) -> BoxFuture<'a, anyhow::Result<ClaimResponse>> {
        Box::pin(async move {
            self.calls.lock().expect("should lock").push(request.clone());
            Err(anyhow!("claim source unavailable"))
        })
    }
}
