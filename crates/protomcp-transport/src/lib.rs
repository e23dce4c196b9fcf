//! Transport abstraction: a duplex, ordered, message-framed channel.
//!
//! A [`Transport`] delivers framed [`TransportMessage`]s in both
//! directions and signals closure. Concrete implementations live behind
//! feature flags: [`stdio`] (always available), [`socket`] (length- or
//! newline-framed Unix/TCP), `sse` (an SSE GET paired with HTTP POSTs), and
//! `websocket` (one text frame per envelope).

pub mod error;
pub mod traits;

#[cfg(feature = "stdio")]
pub mod stdio;

#[cfg(feature = "socket")]
pub mod socket;

#[cfg(feature = "sse")]
pub mod sse;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{TransportError, TransportResult};
pub use traits::{Transport, TransportMessage};
