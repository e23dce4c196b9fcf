//! Per-request handler context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use protomcp_auth::Principal;
use protomcp_protocol::error::Error;
use protomcp_protocol::version::ProtocolVersion;
use serde_json::Value;
use tokio::sync::Notify;

/// Facilities a [`RequestContext`] needs from its owning session: sending a
/// peer-initiated notification (progress) and calling a peer method
/// (`readResource`, `callTool`, `sampling/createMessage`, ...). Implemented
/// by `protomcp-session::Session` itself; kept as a trait so this module
/// doesn't need to know about `Session`'s internals.
#[async_trait]
pub trait PeerFacilities: Send + Sync {
    /// Send a fire-and-forget notification to the peer.
    async fn notify(&self, method: &str, params: Option<Value>);

    /// Call a peer method and await its response.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, Error>;
}

/// Cooperative cancellation signal, set when a cancellation notification
/// arrives for this request's id, or when the caller cancels the local
/// context directly.
#[derive(Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Cancellation {
    /// Mark this context cancelled and wake anyone awaiting it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested. Handlers race this against
    /// their own work to react promptly: all blocking operations accept a
    /// cancellation signal.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// The per-request context handed to a dispatched handler.
#[derive(Clone)]
pub struct RequestContext {
    progress_token: Option<Value>,
    peer: Arc<dyn PeerFacilities>,
    negotiated_version: ProtocolVersion,
    principal: Option<Principal>,
    cancellation: Cancellation,
}

impl RequestContext {
    /// Build a new context. Internal constructor; `protomcp-session`'s
    /// dispatcher builds one per inbound request.
    pub fn new(
        progress_token: Option<Value>,
        peer: Arc<dyn PeerFacilities>,
        negotiated_version: ProtocolVersion,
        principal: Option<Principal>,
        cancellation: Cancellation,
    ) -> Self {
        Self {
            progress_token,
            peer,
            negotiated_version,
            principal,
            cancellation,
        }
    }

    /// The protocol version negotiated for this session.
    pub fn negotiated_version(&self) -> ProtocolVersion {
        self.negotiated_version
    }

    /// The authenticated principal, if an auth hook attached one.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Report progress on this request's progress token, if the caller
    /// supplied one. A no-op if it didn't.
    pub async fn report_progress(&self, value: Value, message: Option<String>) {
        let Some(token) = &self.progress_token else {
            return;
        };
        let mut params = serde_json::json!({ "token": token, "value": value });
        if let Some(message) = message {
            params["message"] = Value::String(message);
        }
        self.peer.notify("$/progress", Some(params)).await;
    }

    /// Whether the peer has asked this request to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolve once the peer cancels this request.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// Call a peer method (`resources/read`, `tools/call`, a server
    /// calling back into `sampling/createMessage`, etc.).
    pub async fn call_peer(&self, method: &str, params: Option<Value>) -> Result<Value, Error> {
        self.peer.call(method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellation_wakes_pending_waiter() {
        let cancellation = Cancellation::default();
        let waiter = cancellation.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        assert!(!cancellation.is_cancelled());
        cancellation.cancel();
        handle.await.unwrap();
        assert!(cancellation.is_cancelled());
    }
}
