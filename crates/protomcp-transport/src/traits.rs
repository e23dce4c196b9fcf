//! The core transport contract.

use async_trait::async_trait;

use crate::error::TransportResult;

/// One framed message moving across a transport: an already-encoded
/// envelope, not yet classified. Classification into request/response/
/// notification happens one layer up, in `protomcp-session`, once the
/// message has actually arrived — the transport only promises ordered,
/// whole-message delivery.
pub type TransportMessage = Vec<u8>;

/// A duplex, ordered, message-framed channel.
///
/// Implementations MUST preserve send order: for messages A then B handed
/// to `send` on the same transport instance, the peer observes A before B.
/// `send` may block for backpressure but must never silently drop a
/// message; on a write failure the transport enters a terminal failed
/// state, further `send`/`receive` calls return [`TransportError::Closed`]
/// (`crate::error::TransportError`), and [`Transport::closed`] resolves.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one framed message. Ordered with respect to prior `send`
    /// calls on `self`.
    async fn send(&self, message: TransportMessage) -> TransportResult<()>;

    /// Receive the next framed message, or `Ok(None)` if the peer closed
    /// the channel in an orderly way.
    async fn receive(&self) -> TransportResult<Option<TransportMessage>>;

    /// Close this end of the transport. Idempotent.
    async fn close(&self) -> TransportResult<()>;

    /// A future that resolves once the transport has entered a terminal
    /// (closed or failed) state, for callers that want to select on it
    /// alongside other work rather than polling `receive`.
    async fn closed(&self);
}

/// A one-shot signal a transport implementation fires when it observes its
/// underlying channel end (peer hangup, process exit, socket error).
/// `protomcp-session`'s reader task selects on this alongside `receive` so
/// a close that arrives without a final `receive -> Ok(None)` is still
/// observed promptly.
#[derive(Debug)]
pub struct CloseSignal {
    receiver: tokio::sync::watch::Receiver<bool>,
}

impl CloseSignal {
    /// Build a linked sender/receiver pair.
    pub fn channel() -> (CloseSignalSender, Self) {
        let (tx, rx) = tokio::sync::watch::channel(false);
        (CloseSignalSender(tx), Self { receiver: rx })
    }

    /// Wait until the signal fires.
    pub async fn wait(&self) {
        let mut rx = self.receiver.clone();
        let _ = rx.wait_for(|fired| *fired).await;
    }

    /// Whether the signal has already fired.
    pub fn is_fired(&self) -> bool {
        *self.receiver.borrow()
    }
}

impl Clone for CloseSignal {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
        }
    }
}

/// The sending half of a [`CloseSignal`].
#[derive(Debug, Clone)]
pub struct CloseSignalSender(tokio::sync::watch::Sender<bool>);

impl CloseSignalSender {
    /// Fire the signal. Idempotent.
    pub fn fire(&self) {
        let _ = self.0.send(true);
    }
}
