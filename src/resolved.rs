//! # Resolved Claims
//!
//! Value types describing the outcome of resolving a claim: a `Resolved` value
//! tagged with its identity assurance level, or an `Unresolved` marker carrying
//! the reason no value could be produced.
//!
//! `Claim` and `ClaimResponse` are treated as values. Combining or filtering
//! them allocates new sequences rather than mutating the originals, so a
//! response can be read concurrently while another is derived from it.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Identity Assurance Level: how strongly the identity behind a claim value
/// has been verified. Valid levels are 1, 2, and 3; higher is stronger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Ial(u8);

impl Ial {
    /// Lowest assurance level, used when a request does not specify one.
    pub const ONE: Self = Self(1);
    /// Intermediate assurance level.
    pub const TWO: Self = Self(2);
    /// Highest assurance level.
    pub const THREE: Self = Self(3);

    /// The numeric level.
    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }
}

impl Default for Ial {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<u8> for Ial {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1..=3 => Ok(Self(level)),
            _ => Err(Error::InvalidRequest(format!("ial {level} should be 1, 2 or 3"))),
        }
    }
}

impl From<Ial> for u8 {
    fn from(ial: Ial) -> Self {
        ial.0
    }
}

impl Display for Ial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single candidate value for a claim, as produced by one claim source.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Resolved {
    /// The claim value.
    pub value: Value,

    /// How strongly the value's identity was verified.
    pub ial: Ial,
}

impl Resolved {
    /// Create a new resolved value.
    pub fn new(value: impl Into<Value>, ial: Ial) -> Self {
        Self {
            value: value.into(),
            ial,
        }
    }
}

/// Reasons a claim could not be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedKind {
    /// No claim source could produce a value at the requested assurance level.
    NotFound,

    /// The claim source responsible for the claim failed.
    InternalError,

    /// The claim's assertion used an unsupported operator.
    UnknownOperator,

    /// The claim's assertion was structurally invalid.
    SyntaxError,
}

impl UnresolvedKind {
    /// The wire name of the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InternalError => "internal_error",
            Self::UnknownOperator => "unknown_operator",
            Self::SyntaxError => "syntax_error",
        }
    }
}

impl Display for UnresolvedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker recording why a claim value is missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Unresolved {
    /// The reason.
    #[serde(rename = "type")]
    pub kind: UnresolvedKind,
}

impl Unresolved {
    /// Create a marker for the given reason.
    #[must_use]
    pub const fn new(kind: UnresolvedKind) -> Self {
        Self { kind }
    }

    /// No value was found.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::new(UnresolvedKind::NotFound)
    }

    /// The responsible claim source failed.
    #[must_use]
    pub const fn internal_error() -> Self {
        Self::new(UnresolvedKind::InternalError)
    }
}

/// The outcome of resolving one claim name: every value produced plus a marker
/// for every attempt that produced nothing.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Claim {
    /// Values produced for the claim, in merge order.
    #[serde(default)]
    pub resolved: Vec<Resolved>,

    /// Reasons values could not be produced.
    #[serde(default)]
    pub unresolved: Vec<Unresolved>,
}

impl Claim {
    /// Create a claim from resolved and unresolved entries.
    #[must_use]
    pub const fn new(resolved: Vec<Resolved>, unresolved: Vec<Unresolved>) -> Self {
        Self {
            resolved,
            unresolved,
        }
    }

    /// A claim holding only the given values.
    #[must_use]
    pub const fn from_resolved(resolved: Vec<Resolved>) -> Self {
        Self::new(resolved, vec![])
    }

    /// A claim with no values and a single marker for the given reason.
    #[must_use]
    pub fn unresolved(kind: UnresolvedKind) -> Self {
        Self::new(vec![], vec![Unresolved::new(kind)])
    }

    /// A claim no source could produce.
    #[must_use]
    pub fn not_found() -> Self {
        Self::unresolved(UnresolvedKind::NotFound)
    }

    /// A claim whose source failed.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::unresolved(UnresolvedKind::InternalError)
    }

    /// Total number of entries, resolved and unresolved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolved.len() + self.unresolved.len()
    }

    /// Returns `true` when the claim holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.unresolved.is_empty()
    }

    /// Returns `true` when any unresolved marker has the given reason.
    #[must_use]
    pub fn has_unresolved(&self, kind: UnresolvedKind) -> bool {
        self.unresolved.iter().any(|u| u.kind == kind)
    }

    /// Append `other`'s entries after this claim's entries. No entries are
    /// dropped or de-duplicated.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut resolved = Vec::with_capacity(self.resolved.len() + other.resolved.len());
        resolved.extend_from_slice(&self.resolved);
        resolved.extend_from_slice(&other.resolved);

        let mut unresolved = Vec::with_capacity(self.unresolved.len() + other.unresolved.len());
        unresolved.extend_from_slice(&self.unresolved);
        unresolved.extend_from_slice(&other.unresolved);

        Self::new(resolved, unresolved)
    }

    /// Demote every value verified below `min` to a `not_found` marker.
    ///
    /// Values meeting the threshold keep their relative order. Existing
    /// markers are kept ahead of the demoted ones.
    #[must_use]
    pub fn filter_by_ial(&self, min: Ial) -> Self {
        let (resolved, demoted): (Vec<_>, Vec<_>) =
            self.resolved.iter().cloned().partition(|r| r.ial >= min);

        let mut unresolved = self.unresolved.clone();
        unresolved.extend(demoted.iter().map(|_| Unresolved::not_found()));

        Self::new(resolved, unresolved)
    }

    /// Keep only values satisfying `predicate`. Rejected values are discarded:
    /// the result describes matches, not candidates.
    #[must_use]
    pub fn retain_matching(&self, predicate: impl Fn(&Value) -> bool) -> Self {
        let resolved = self.resolved.iter().filter(|r| predicate(&r.value)).cloned().collect();
        Self::new(resolved, self.unresolved.clone())
    }
}

/// Claim outcomes keyed by claim name.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ClaimResponse(BTreeMap<String, Claim>);

impl ClaimResponse {
    /// An empty response.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// The outcome for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Claim> {
        self.0.get(name)
    }

    /// Returns `true` if the response holds an outcome for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// A copy of this response with `claim` set for `name`, replacing any
    /// previous outcome.
    #[must_use]
    pub fn with(&self, name: impl Into<String>, claim: Claim) -> Self {
        let mut claims = self.0.clone();
        claims.insert(name.into(), claim);
        Self(claims)
    }

    /// Claim names in the response.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over claim outcomes.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Claim)> {
        self.0.iter().map(|(name, claim)| (name.as_str(), claim))
    }

    /// Number of claim names in the response.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the response holds no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Claim-wise concatenation: outcomes for the same name are concatenated,
    /// this response's entries first.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut claims = self.0.clone();
        for (name, claim) in &other.0 {
            let merged = claims.get(name).map_or_else(|| claim.clone(), |c| c.concat(claim));
            claims.insert(name.clone(), merged);
        }
        Self(claims)
    }

    /// A copy of this response restricted to `names`.
    #[must_use]
    pub fn narrow<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut claims = BTreeMap::new();
        for name in names {
            if let Some(claim) = self.0.get(name) {
                claims.insert(name.to_string(), claim.clone());
            }
        }
        Self(claims)
    }
}

impl<K: Into<String>> FromIterator<(K, Claim)> for ClaimResponse {
    fn from_iter<I: IntoIterator<Item = (K, Claim)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<K: Into<String>, const N: usize> From<[(K, Claim); N]> for ClaimResponse {
    fn from(claims: [(K, Claim); N]) -> Self {
        claims.into_iter().collect()
    }
}
