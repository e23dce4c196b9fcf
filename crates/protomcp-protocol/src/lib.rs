//! JSON-RPC 2.0 envelope codec and MCP wire types.
//!
//! This crate owns the data model shared by every other `protomcp` crate:
//! the envelope codec, the protocol version negotiation types, the
//! capability/content data model, and the stable error taxonomy used as
//! both a Rust `Error` and a JSON-RPC error code.

pub mod capabilities;
pub mod content;
pub mod error;
pub mod id;
pub mod jsonrpc;
pub mod types;
pub mod version;

pub use error::{Error, ErrorKind, Result};
pub use id::RequestId;
pub use jsonrpc::{Envelope, JsonRpcError, Notification, Request, Response, ResponsePayload};
pub use version::ProtocolVersion;

/// JSON-RPC version string every envelope carries.
pub const JSONRPC_VERSION: &str = "2.0";
