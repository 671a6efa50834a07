//! Protocol-level error objects.
//!
//! These never surface as Rust errors to callers: every failure the
//! dispatcher can describe is rendered as an [`RpcError`] inside a response.

use serde::{Deserialize, Serialize};

use crate::registry::HandlerError;

/// Payload could not be decoded in the configured wire format.
pub const PARSE_ERROR: i64 = -32700;
/// Payload decoded but has the wrong shape.
pub const INVALID_REQUEST: i64 = -32600;
/// No method is registered under the requested name.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// The handler rejected the supplied params.
pub const INVALID_PARAMS: i64 = -32602;
/// The handler failed or panicked.
pub const INTERNAL_ERROR: i64 = -32603;

/// Error member of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Short human-readable description.
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: &str) -> Self {
        Self {
            code,
            message: message.to_owned(),
        }
    }

    /// `-32700 Parse error`.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    /// `-32600 Invalid Request`.
    #[must_use]
    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    /// `-32601 Method not found`.
    #[must_use]
    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    /// `-32602 Invalid params`.
    #[must_use]
    pub fn invalid_params() -> Self {
        Self::new(INVALID_PARAMS, "Invalid params")
    }

    /// `-32603 Internal error`.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::new(INTERNAL_ERROR, "Internal error")
    }
}

impl From<&HandlerError> for RpcError {
    fn from(error: &HandlerError) -> Self {
        match error {
            HandlerError::InvalidParams(_) => Self::invalid_params(),
            _ => Self::internal_error(),
        }
    }
}
