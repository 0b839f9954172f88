//! # Claim Aggregator
//!
//! Claim values are provided by any number of independent claim sources
//! ([`Resolver`]s). Each resolver advertises the claims it can provide and the
//! highest identity assurance level (IAL) it can provide them at.
//!
//! The [`Aggregator`] routes a claim request to the resolvers able to satisfy
//! it, invokes them concurrently, and merges their responses:
//!
//! - a claim no resolver can provide at the requested IAL is `not_found`
//!   without any resolver being called;
//! - each resolver is called at most once per request, and only with the
//!   claims it is able to provide;
//! - a failing resolver only affects the claims it was asked for, which are
//!   reported as `internal_error`;
//! - responses are merged in resolver registration order, regardless of the
//!   order in which resolvers complete.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::provider::ClaimSource;
use crate::resolved::{Claim, ClaimResponse, Ial};
use crate::{Result, invalid};

/// The assurance requested for a single claim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Requested {
    /// Minimum acceptable identity assurance level.
    #[serde(default)]
    pub ial: Ial,
}

/// Claims requested from the aggregator, keyed by claim name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ClaimRequest(BTreeMap<String, Requested>);

impl ClaimRequest {
    /// An empty request.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Request `name` at `ial`. When `name` has already been requested, the
    /// lower of the two levels is kept so that values for every requester
    /// are retrieved.
    pub fn require(&mut self, name: impl Into<String>, ial: Ial) {
        self.0
            .entry(name.into())
            .and_modify(|r| r.ial = r.ial.min(ial))
            .or_insert(Requested { ial });
    }

    /// Builder-style variant of [`ClaimRequest::require`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, ial: Ial) -> Self {
        self.require(name, ial);
        self
    }

    /// The requested assurance for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Requested> {
        self.0.get(name)
    }

    /// Requested claim names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over requested claims.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Requested)> {
        self.0.iter().map(|(name, requested)| (name.as_str(), requested))
    }

    /// Number of requested claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no claims are requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<&Value> for ClaimRequest {
    type Error = crate::Error;

    fn try_from(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| invalid!("invalid claim request: {e}"))
    }
}

/// A source of claim values.
///
/// Resolvers are registered with an [`Aggregator`] once, at construction, and
/// are otherwise opaque to it.
pub trait Resolver: Debug + Send + Sync {
    /// The claims this resolver can provide, each with the highest identity
    /// assurance level it can provide the claim at.
    fn capabilities(&self) -> BTreeMap<String, u8>;

    /// Resolve `request` for the subject identified by `subject_id`.
    ///
    /// Only claims returned by [`Resolver::capabilities`] are requested.
    /// Returning an error marks every requested claim as `internal_error`.
    fn resolve<'a>(
        &'a self, subject_id: &'a str, request: &'a ClaimRequest,
    ) -> BoxFuture<'a, anyhow::Result<ClaimResponse>>;
}

/// Routes claim requests to registered resolvers and merges their responses.
///
/// The capability index is built once, at construction, and never modified.
/// An `Aggregator` can be shared between concurrent requests.
#[derive(Clone, Debug)]
pub struct Aggregator {
    resolvers: Vec<Arc<dyn Resolver>>,

    // claim name -> (position in `resolvers`, highest IAL available)
    index: BTreeMap<String, Vec<(usize, Ial)>>,
}

impl Aggregator {
    /// Create an aggregator for `resolvers`. Registration order determines
    /// merge order.
    ///
    /// # Errors
    ///
    /// Returns an error if a resolver advertises an empty claim name or an
    /// assurance level other than 1, 2 or 3.
    pub fn new(resolvers: Vec<Arc<dyn Resolver>>) -> Result<Self> {
        let mut index: BTreeMap<String, Vec<(usize, Ial)>> = BTreeMap::new();

        for (position, resolver) in resolvers.iter().enumerate() {
            for (name, level) in resolver.capabilities() {
                if name.is_empty() {
                    return Err(invalid!("resolver {position} advertises an empty claim name"));
                }
                let Ok(ial) = Ial::try_from(level) else {
                    return Err(invalid!(
                        "resolver {position} advertises ial {level} for {name}, should be 1, 2 or 3"
                    ));
                };
                index.entry(name).or_default().push((position, ial));
            }
        }

        Ok(Self { resolvers, index })
    }

    /// Claims available from registered resolvers, each with the highest
    /// assurance level any resolver provides it at.
    #[must_use]
    pub fn claims_supported(&self) -> BTreeMap<String, Ial> {
        self.index
            .iter()
            .filter_map(|(name, entries)| {
                entries.iter().map(|(_, ial)| *ial).max().map(|ial| (name.clone(), ial))
            })
            .collect()
    }

    /// Resolve `request` for the subject identified by `subject_id`.
    ///
    /// Every requested claim is present in the response.
    ///
    /// # Errors
    ///
    /// Returns an error, before any resolver is called, if `subject_id` or any
    /// requested claim name is empty. Resolver failures are not errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, subject_id: &str, request: &ClaimRequest) -> Result<ClaimResponse> {
        tracing::debug!("aggregator::resolve");

        if subject_id.is_empty() {
            return Err(invalid!("no `subject_id` specified"));
        }
        if request.names().any(str::is_empty) {
            return Err(invalid!("claim names cannot be empty"));
        }

        // route each claim to the resolvers able to provide it
        let mut not_found = vec![];
        let mut routes: BTreeMap<usize, ClaimRequest> = BTreeMap::new();

        for (name, requested) in request.iter() {
            let capable = self.capable(name, requested.ial);
            if capable.is_empty() {
                tracing::debug!("no resolver provides {name} at ial {}", requested.ial);
                not_found.push((name, Claim::not_found()));
                continue;
            }
            for position in capable {
                routes.entry(position).or_default().require(name, requested.ial);
            }
        }

        // call resolvers concurrently; `join_all` keeps registration order
        let calls = routes.iter().map(|(position, routed)| self.call(*position, subject_id, routed));
        let partials = future::join_all(calls).await;

        let mut response: ClaimResponse = not_found.into_iter().collect();
        for partial in &partials {
            response = response.concat(partial);
        }

        // a resolver may not answer for every claim it was asked for
        let missing: Vec<&str> = request.names().filter(|name| !response.contains(name)).collect();
        for name in missing {
            response = response.with(name, Claim::not_found());
        }

        Ok(response)
    }

    fn capable(&self, name: &str, ial: Ial) -> Vec<usize> {
        self.index.get(name).map_or_else(Vec::new, |entries| {
            entries.iter().filter(|(_, max)| *max >= ial).map(|(position, _)| *position).collect()
        })
    }

    // Call a single resolver, converting failure into `internal_error` claims.
    async fn call(&self, position: usize, subject_id: &str, request: &ClaimRequest) -> ClaimResponse {
        let resolver = &self.resolvers[position];

        match resolver.resolve(subject_id, request).await {
            // ignore claims that were not asked for
            Ok(response) => response.narrow(request.names()),
            Err(e) => {
                tracing::warn!("resolver {position} failed: {e}");
                request.names().map(|name| (name, Claim::internal_error())).collect()
            }
        }
    }
}

impl ClaimSource for Aggregator {
    fn resolve(
        &self, subject_id: &str, request: &ClaimRequest,
    ) -> impl Future<Output = anyhow::Result<ClaimResponse>> + Send {
        async move { Ok(Self::resolve(self, subject_id, request).await?) }
    }
}
