//! # Claim Resolution and Consent
//!
//! An engine for releasing identity claims to `OpenID` Connect relying
//! parties. It:
//!
//! - aggregates claim values from independent claim sources, each able to
//!   provide some claims at some identity assurance level (IAL);
//! - evaluates assertions, small typed queries, against resolved values so a
//!   relying party can learn whether a value meets a condition without
//!   receiving the value itself;
//! - records the end user's consent, checking the values released are the
//!   values that were requested and resolved.
//!
//! The `OpenID` protocol itself (authorization codes, tokens, sessions) is
//! left to the host. Hosts drive the engine through the [`handlers`] and
//! supply configuration, claim values, and consent storage by implementing
//! the [`provider`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use credibil_claims::endpoint;
//! use credibil_claims::types::InteractionRequest;
//!
//! let request = InteractionRequest {
//!     client_id: "client".into(),
//!     user_id: "user".into(),
//!     claims: Some(serde_json::json!({"userinfo": {"email": {"ial": 2}}})),
//!     scope: "openid".into(),
//! };
//! let response = endpoint::handle(request, &provider).await?;
//! ```

pub mod aggregator;
pub mod assertion;
pub mod consent;
pub mod endpoint;
mod error;
pub mod handlers;
pub mod phone;
pub mod provider;
pub mod resolved;
pub mod types;

pub use error::{Error, ErrorResponse};

/// Result type for claim resolution and consent.
pub type Result<T, E = Error> = std::result::Result<T, E>;
