//! # Errors
//!
//! Errors surfaced to the enclosing protocol layer. Each variant renders as an
//! `OpenID`-style error object so it can be returned to a client without
//! further translation.

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::assertion::CompileError;
use crate::consent::ConsentError;

/// Error codes returned by the claim resolution and consent engine.
#[derive(Error, Debug, Deserialize)]
pub enum Error {
    /// The request is missing a required parameter, includes an invalid
    /// parameter value, or is otherwise malformed. This includes malformed
    /// assertion expressions and consent decisions that reference claims or
    /// values that were never requested.
    #[error(r#"{{"error": "invalid_request", "error_description": {}}}"#, quoted(.0))]
    InvalidRequest(String),

    /// The request is valid but conflicts with the current state of the
    /// consent it refers to.
    #[error(r#"{{"error": "illegal_state", "error_description": {}}}"#, quoted(.0))]
    IllegalState(String),

    /// An unexpected condition prevented the request from being fulfilled.
    #[error(r#"{{"error": "server_error", "error_description": {}}}"#, quoted(.0))]
    ServerError(String),
}

/// Error response body.
#[derive(Deserialize, Serialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,

    /// Error description.
    pub error_description: String,
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as SerdeError;

        let Ok(error) = serde_json::from_str::<ErrorResponse>(&self.to_string()) else {
            return Err(SerdeError::custom("issue deserializing Err"));
        };
        error.serialize(serializer)
    }
}

impl Error {
    /// Transform error to an `OpenID` compatible json object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.to_string()).unwrap_or_default()
    }

    /// The HTTP status code the enclosing layer should respond with.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::IllegalState(_) => 409,
            Self::ServerError(_) => 500,
        }
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<ConsentError> for Error {
    fn from(err: ConsentError) -> Self {
        if err.is_conflict() {
            Self::IllegalState(err.to_string())
        } else {
            Self::InvalidRequest(err.to_string())
        }
    }
}

// Descriptions may contain quotes, so are rendered as JSON strings.
fn quoted(description: &str) -> String {
    serde_json::to_string(description).unwrap_or_default()
}

/// Construct an `Error::InvalidRequest` error from a string or format
/// arguments.
#[macro_export]
macro_rules! invalid {
    ($fmt:literal, $($arg:tt)*) => {
        $crate::Error::InvalidRequest(format!($fmt, $($arg)*))
    };
    ($msg:literal $(,)?) => {
        $crate::Error::InvalidRequest(format!($msg))
    };
}

/// Construct an `Error::ServerError` error from a string or format arguments.
#[macro_export]
macro_rules! server {
    ($fmt:literal, $($arg:tt)*) => {
        $crate::Error::ServerError(format!($fmt, $($arg)*))
    };
    ($msg:literal $(,)?) => {
        $crate::Error::ServerError(format!($msg))
    };
}
