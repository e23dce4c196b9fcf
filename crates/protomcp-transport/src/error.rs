//! Transport-level errors.

use protomcp_protocol::{Error, ErrorKind};

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A transport failure. Always maps to [`ErrorKind::OperationFailed`] or
/// [`ErrorKind::SessionClosed`] when surfaced to a caller above the
/// transport boundary — the transport layer itself never emits a
/// JSON-RPC-shaped error of its own; transport failures are never sent to
/// the peer, only reported locally.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The transport was asked to send/receive after it entered a
    /// terminal failed or closed state.
    #[error("transport is closed")]
    Closed,
    /// A frame could not be encoded or decoded.
    #[error("framing error: {0}")]
    Framing(String),
    /// A configuration value was invalid for this transport kind.
    #[error("invalid transport configuration: {0}")]
    Config(String),
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        let kind = match err {
            TransportError::Closed => ErrorKind::SessionClosed,
            _ => ErrorKind::OperationFailed,
        };
        Error::new(kind, err.to_string())
    }
}
