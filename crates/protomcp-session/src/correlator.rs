//! Request correlator: maps an outbound request id to a waiter.
//!
//! An entry is removed on the first of {response arrives, deadline, local
//! cancel, session close}, and the waiter is completed exactly once.
//! Progress routing shares the same table: a request registered with a
//! progress token gets a sink that `deliver_progress` feeds until the
//! request completes.

use std::collections::HashMap;
use std::sync::Mutex;

use protomcp_protocol::jsonrpc::JsonRpcError;
use protomcp_protocol::RequestId;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// How a pending call finished.
#[derive(Debug)]
pub enum Completion {
    /// The peer answered.
    Response(Result<Value, JsonRpcError>),
    /// The local deadline elapsed first.
    TimedOut,
    /// The caller cancelled locally.
    Cancelled,
    /// The session closed while this call was outstanding.
    SessionClosed,
}

struct Entry {
    waiter: oneshot::Sender<Completion>,
    progress_sink: Option<mpsc::Sender<Value>>,
}

/// The correlator's pending-request table.
#[derive(Default)]
pub struct Correlator {
    pending: Mutex<HashMap<RequestId, Entry>>,
    /// Secondary index from a progress token's canonical string form to the
    /// request id that owns it, so progress routing doesn't need to scan
    /// every pending entry.
    by_progress_token: Mutex<HashMap<String, RequestId>>,
}

/// A handle returned by [`Correlator::register`]: awaiting it yields the
/// call's [`Completion`]. Dropping it without awaiting leaves the entry in
/// place (the caller is expected to always await or explicitly `cancel`).
pub struct Waiter {
    receiver: oneshot::Receiver<Completion>,
}

impl Waiter {
    /// Wait for the call to complete.
    pub async fn wait(self) -> Completion {
        match self.receiver.await {
            Ok(completion) => completion,
            // The sender side was dropped without completing, which only
            // happens if the correlator itself was torn down uncleanly.
            Err(_) => Completion::SessionClosed,
        }
    }
}

/// An optional channel of progress updates for a call registered with a
/// progress token.
pub struct ProgressReceiver {
    receiver: mpsc::Receiver<Value>,
}

impl ProgressReceiver {
    /// Receive the next progress value, or `None` once the call completes
    /// and the sink is dropped.
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }
}

impl Correlator {
    /// Register a new pending request. `progress_token`, if given, is the
    /// canonical string key under which progress notifications for this
    /// call will be routed.
    pub fn register(
        &self,
        id: RequestId,
        progress_token: Option<String>,
    ) -> (Waiter, Option<ProgressReceiver>) {
        let (waiter_tx, waiter_rx) = oneshot::channel();
        let progress = progress_token.as_ref().map(|_| mpsc::channel(64));
        let (progress_sink, progress_receiver) = match progress {
            Some((tx, rx)) => (Some(tx), Some(ProgressReceiver { receiver: rx })),
            None => (None, None),
        };

        let mut pending = self.pending.lock().unwrap();
        pending.insert(
            id.clone(),
            Entry {
                waiter: waiter_tx,
                progress_sink,
            },
        );
        drop(pending);

        if let Some(token) = progress_token {
            self.by_progress_token.lock().unwrap().insert(token, id);
        }

        (Waiter { receiver: waiter_rx }, progress_receiver)
    }

    /// Complete a pending entry with the peer's response. Unknown ids are
    /// logged at debug and discarded (a late arrival after cancel).
    pub fn complete_response(&self, id: &RequestId, result: Result<Value, JsonRpcError>) {
        self.finish(id, Completion::Response(result));
    }

    /// Remove and complete an entry locally (timeout, cancel, or session
    /// close). Returns `true` if an entry was actually present, so the
    /// caller knows whether to bother sending a cancellation notification.
    pub fn finish(&self, id: &RequestId, completion: Completion) -> bool {
        let entry = {
            let mut pending = self.pending.lock().unwrap();
            pending.remove(id)
        };
        self.drop_progress_index(id);
        match entry {
            Some(entry) => {
                // Completion is best-effort: if the caller already dropped
                // its waiter (e.g. it raced a cancel against a response),
                // there's nothing left to notify.
                let _ = entry.waiter.send(completion);
                true
            }
            None => {
                debug!(%id, "correlator: no pending entry for id, discarding");
                false
            }
        }
    }

    /// Route an inbound progress notification to the matching pending call,
    /// if any. Progress for an unknown token is silently dropped.
    pub fn deliver_progress(&self, token: &str, value: Value) {
        let id = {
            let index = self.by_progress_token.lock().unwrap();
            index.get(token).cloned()
        };
        let Some(id) = id else {
            debug!(%token, "correlator: progress for unknown token, dropping");
            return;
        };
        let sink = {
            let pending = self.pending.lock().unwrap();
            pending.get(&id).and_then(|e| e.progress_sink.clone())
        };
        if let Some(sink) = sink {
            // A full channel means the caller isn't draining progress fast
            // enough; drop rather than block the reader task.
            let _ = sink.try_send(value);
        }
    }

    /// Tear down every pending entry with `SessionClosed`, used when the
    /// session transitions to CLOSED.
    pub fn close_all(&self) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().collect()
        };
        self.by_progress_token.lock().unwrap().clear();
        for (id, entry) in drained {
            debug!(%id, "correlator: completing pending entry with SessionClosed");
            let _ = entry.waiter.send(Completion::SessionClosed);
        }
    }

    /// Whether any requests are currently outstanding (used by tests and by
    /// the supervisor's crash-handling path).
    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }

    fn drop_progress_index(&self, id: &RequestId) {
        let mut index = self.by_progress_token.lock().unwrap();
        index.retain(|_, mapped_id| mapped_id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protomcp_protocol::RequestId;

    #[tokio::test]
    async fn response_completes_waiter_exactly_once() {
        let correlator = Correlator::default();
        let id = RequestId::from_counter(1);
        let (waiter, _progress) = correlator.register(id.clone(), None);
        correlator.complete_response(&id, Ok(serde_json::json!({"ok": true})));
        match waiter.wait().await {
            Completion::Response(Ok(v)) => assert_eq!(v, serde_json::json!({"ok": true})),
            other => panic!("unexpected completion: {other:?}"),
        }
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn unknown_id_response_is_discarded() {
        let correlator = Correlator::default();
        let id = RequestId::from_counter(99);
        // No register call: this simulates a late arrival after cancel.
        correlator.complete_response(&id, Ok(serde_json::json!(null)));
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn progress_routes_to_registered_token_and_is_dropped_after() {
        let correlator = Correlator::default();
        let id = RequestId::from_counter(1);
        let (waiter, progress) = correlator.register(id.clone(), Some("tok".into()));
        let mut progress = progress.unwrap();

        correlator.deliver_progress("tok", serde_json::json!(1));
        correlator.deliver_progress("tok", serde_json::json!(2));
        assert_eq!(progress.recv().await, Some(serde_json::json!(1)));
        assert_eq!(progress.recv().await, Some(serde_json::json!(2)));

        correlator.complete_response(&id, Ok(serde_json::json!(null)));
        let _ = waiter.wait().await;
        // Sink dropped on completion: further progress for the same token
        // has nothing to deliver to.
        correlator.deliver_progress("tok", serde_json::json!(3));
        assert_eq!(progress.recv().await, None);
    }

    #[tokio::test]
    async fn progress_for_unmatched_token_is_silently_dropped() {
        let correlator = Correlator::default();
        // No panic, no error return value -- just nothing happens.
        correlator.deliver_progress("nonexistent", serde_json::json!(1));
    }

    #[tokio::test]
    async fn close_all_releases_every_waiter_with_session_closed() {
        let correlator = Correlator::default();
        let id1 = RequestId::from_counter(1);
        let id2 = RequestId::from_counter(2);
        let (w1, _) = correlator.register(id1, None);
        let (w2, _) = correlator.register(id2, None);
        correlator.close_all();
        assert!(matches!(w1.wait().await, Completion::SessionClosed));
        assert!(matches!(w2.wait().await, Completion::SessionClosed));
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn rapid_register_and_finish_leaves_no_leak() {
        let correlator = Correlator::default();
        for i in 0..1000u64 {
            let id = RequestId::from_counter(i);
            let (waiter, _) = correlator.register(id.clone(), None);
            assert!(correlator.finish(&id, Completion::Cancelled));
            let _ = waiter.wait().await;
        }
        assert!(correlator.is_empty());
    }
}
