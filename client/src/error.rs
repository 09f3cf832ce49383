//! Error types for the plantdoc client.
//!
//! Internally every failure is an [`Error`]. At the public boundary each one is
//! flattened into an [`ErrorDescriptor`], the single `{"error": "..."}` shape
//! UI callers check for.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a client operation: the decoded payload or an error descriptor.
pub type ApiResult = std::result::Result<Value, ErrorDescriptor>;

/// Errors that can occur while talking to the prediction service.
#[derive(Error, Debug)]
pub enum Error {
    /// The service could not be reached
    #[error("connection failed: ensure the service is reachable")]
    Connection,

    /// The request exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// Any other transport-level failure
    #[error("unexpected error: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("{message}")]
    Status { status: u16, message: String },

    /// A success response whose body was not valid JSON
    #[error("malformed response")]
    MalformedResponse(String),

    /// Caller-supplied input rejected before any request was sent
    #[error("invalid request: {0}")]
    Validation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a status error from a response body, falling back to the code
    /// when the body is blank.
    pub fn status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            body.to_string()
        };
        Error::Status { status, message }
    }

    /// HTTP status reported by the service, if the failure came from one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The normalized failure shape returned by every client operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub error: String,
}

impl ErrorDescriptor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    /// Recognize an error descriptor inside an already-flattened JSON result.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_object()
            .and_then(|obj| obj.get("error"))
            .and_then(|e| e.as_str())
            .map(Self::new)
    }
}

impl From<Error> for ErrorDescriptor {
    fn from(err: Error) -> Self {
        Self::new(err.to_string())
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)
    }
}

/// Flatten an operation outcome into one JSON value: the payload itself, or
/// `{"error": "<message>"}`.
pub fn into_json(result: ApiResult) -> Value {
    match result {
        Ok(payload) => payload,
        Err(descriptor) => serde_json::json!({ "error": descriptor.error }),
    }
}
