//! Stable error taxonomy.
//!
//! Every fallible operation in the runtime returns an [`Error`] tagged with
//! an [`ErrorKind`]. The kind doubles as the JSON-RPC error code sent to a
//! peer when the error crosses the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A runtime error with a stable kind and an id for log correlation.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    /// Correlates this error instance across logs.
    pub id: Uuid,
    /// Programmatic classification, see [`ErrorKind`].
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// Optional structured data, forwarded verbatim into a JSON-RPC
    /// error's `data` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Error {
    /// Construct a new error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data (surfaced as the JSON-RPC error's `data`).
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The stable JSON-RPC integer code for this error's kind.
    pub fn code(&self) -> i32 {
        self.kind.code()
    }
}

/// Programmatic error classification, one-to-one with the JSON-RPC error
/// codes each kind carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport frame is not valid JSON.
    ParseError,
    /// Envelope structurally invalid, or wrong session state.
    InvalidRequest,
    /// No handler registered for the method.
    MethodNotFound,
    /// Params fail schema/required checks.
    InvalidParams,
    /// Uncaught handler failure.
    InternalError,
    /// `initialize` failed.
    HandshakeError,
    /// Peer offered no acceptable protocol version.
    UnsupportedProtocolVersion,
    /// Tool name not registered.
    ToolNotFound,
    /// Tool arguments fail validation.
    InvalidArgument,
    /// Tool handler returned an error.
    ToolExecutionError,
    /// Auth hook rejected the request.
    AuthenticationFailed,
    /// Optional rate limiter tripped.
    RateLimitExceeded,
    /// Sandbox / path traversal violation.
    SecurityViolation,
    /// Generic IO/business failure.
    OperationFailed,
    /// URI not present in the registry.
    ResourceNotFound,
    /// Post-auth permission check failed.
    AccessDenied,
    /// A `call` was cancelled locally before completion.
    Cancelled,
    /// A `call` exceeded its deadline.
    Timeout,
    /// The session closed while a request was outstanding.
    SessionClosed,
}

impl ErrorKind {
    /// The JSON-RPC error code for this kind.
    ///
    /// `Cancelled`, `Timeout`, and `SessionClosed` are local-only kinds:
    /// they describe failures that happen on this side of the wire and are
    /// never serialized into an outgoing `JsonRpcError`.
    pub fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::HandshakeError => -32000,
            Self::UnsupportedProtocolVersion => -32001,
            Self::ToolNotFound => -32010,
            Self::InvalidArgument => -32011,
            Self::ToolExecutionError => -32012,
            Self::AuthenticationFailed => -32020,
            Self::RateLimitExceeded => -32021,
            Self::SecurityViolation => -32030,
            Self::OperationFailed => -32031,
            Self::ResourceNotFound => -32040,
            Self::AccessDenied => -32041,
            // Local-only: arbitrary codes, never sent to a peer.
            Self::Cancelled => -32800,
            Self::Timeout => -32801,
            Self::SessionClosed => -32802,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

macro_rules! ctor {
    ($name:ident, $kind:ident) => {
        #[doc = concat!("Construct a `", stringify!($kind), "` error.")]
        pub fn $name(message: impl Into<String>) -> Error {
            Error::new(ErrorKind::$kind, message)
        }
    };
}

ctor!(parse_error, ParseError);
ctor!(invalid_request, InvalidRequest);
ctor!(method_not_found, MethodNotFound);
ctor!(invalid_params, InvalidParams);
ctor!(internal_error, InternalError);
ctor!(handshake_error, HandshakeError);
ctor!(unsupported_protocol_version, UnsupportedProtocolVersion);
ctor!(tool_not_found, ToolNotFound);
ctor!(invalid_argument, InvalidArgument);
ctor!(tool_execution_error, ToolExecutionError);
ctor!(authentication_failed, AuthenticationFailed);
ctor!(rate_limit_exceeded, RateLimitExceeded);
ctor!(security_violation, SecurityViolation);
ctor!(operation_failed, OperationFailed);
ctor!(resource_not_found, ResourceNotFound);
ctor!(access_denied, AccessDenied);
ctor!(cancelled, Cancelled);
ctor!(timeout, Timeout);
ctor!(session_closed, SessionClosed);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_known_values() {
        assert_eq!(ErrorKind::ParseError.code(), -32700);
        assert_eq!(ErrorKind::ResourceNotFound.code(), -32040);
        assert_eq!(ErrorKind::AccessDenied.code(), -32041);
    }
}
