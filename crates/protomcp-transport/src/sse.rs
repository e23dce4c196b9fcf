//! SSE + HTTP POST pair transport: a client opens a long-lived
//! GET for server-to-client events and POSTs each outbound message.
//!
//! Server-side multiplexing-by-session-id and the exact SSE framing on the
//! wire are explicitly out of scope; this is the client half that the
//! session engine drives through the same [`Transport`] contract as every
//! other transport.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};
use crate::traits::{CloseSignal, CloseSignalSender, Transport, TransportMessage};

/// SSE (events in) + HTTP POST (requests out) transport.
pub struct SseTransport {
    client: reqwest::Client,
    post_url: String,
    events_rx: AsyncMutex<mpsc::Receiver<TransportMessage>>,
    failed: AtomicBool,
    close_tx: CloseSignalSender,
    close_signal: CloseSignal,
    reader_task: tokio::task::JoinHandle<()>,
}

impl SseTransport {
    /// Connect: open the SSE GET stream against `sse_url` and prepare to
    /// POST outbound envelopes to `post_url`.
    pub async fn connect(sse_url: &str, post_url: &str) -> TransportResult<Self> {
        let client = reqwest::Client::new();
        let response = client
            .get(sse_url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Io(std::io::Error::other(e.to_string())))?;
        if !response.status().is_success() {
            return Err(TransportError::Config(format!(
                "SSE endpoint returned status {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(256);
        let (close_tx, close_signal) = CloseSignal::channel();
        let close_tx_task = close_tx.clone();
        let byte_stream = response.bytes_stream();
        let mut events = byte_stream.eventsource();
        let reader_task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if event.data.is_empty() {
                            continue;
                        }
                        if tx.send(event.data.into_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%err, "sse transport: stream error");
                        break;
                    }
                }
            }
            debug!("sse transport: event stream ended");
            close_tx_task.fire();
        });

        Ok(Self {
            client,
            post_url: post_url.to_string(),
            events_rx: AsyncMutex::new(rx),
            failed: AtomicBool::new(false),
            close_tx,
            close_signal,
            reader_task,
        })
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn send(&self, message: TransportMessage) -> TransportResult<()> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let result = self
            .client
            .post(&self.post_url)
            .header("Content-Type", "application/json")
            .body(message)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                self.failed.store(true, Ordering::SeqCst);
                self.close_tx.fire();
                Err(TransportError::Io(std::io::Error::other(format!(
                    "POST rejected with status {}",
                    response.status()
                ))))
            }
            Err(err) => {
                self.failed.store(true, Ordering::SeqCst);
                self.close_tx.fire();
                Err(TransportError::Io(std::io::Error::other(err.to_string())))
            }
        }
    }

    async fn receive(&self) -> TransportResult<Option<TransportMessage>> {
        let mut rx = self.events_rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> TransportResult<()> {
        self.close_tx.fire();
        self.reader_task.abort();
        Ok(())
    }

    async fn closed(&self) {
        self.close_signal.wait().await;
    }
}
