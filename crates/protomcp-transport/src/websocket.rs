//! WebSocket transport: one text frame per envelope.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};
use crate::traits::{CloseSignal, CloseSignalSender, Transport, TransportMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport; one MCP envelope per text frame.
pub struct WebSocketTransport {
    stream: AsyncMutex<WsStream>,
    failed: AtomicBool,
    close_tx: CloseSignalSender,
    close_signal: CloseSignal,
}

impl WebSocketTransport {
    /// Connect to a `ws://`/`wss://` endpoint.
    pub async fn connect(url: &str) -> TransportResult<Self> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Io(std::io::Error::other(e.to_string())))?;
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established WebSocket stream (e.g. accepted
    /// server-side).
    pub fn from_stream(stream: WsStream) -> Self {
        let (close_tx, close_signal) = CloseSignal::channel();
        Self {
            stream: AsyncMutex::new(stream),
            failed: AtomicBool::new(false),
            close_tx,
            close_signal,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, message: TransportMessage) -> TransportResult<()> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let text = String::from_utf8(message)
            .map_err(|e| TransportError::Framing(format!("message is not UTF-8: {e}")))?;
        let mut stream = self.stream.lock().await;
        if let Err(err) = stream.send(WsMessage::Text(text.into())).await {
            self.failed.store(true, Ordering::SeqCst);
            self.close_tx.fire();
            return Err(TransportError::Io(std::io::Error::other(err.to_string())));
        }
        Ok(())
    }

    async fn receive(&self) -> TransportResult<Option<TransportMessage>> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(WsMessage::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!("websocket transport: peer closed");
                    self.close_tx.fire();
                    return Ok(None);
                }
                Some(Ok(WsMessage::Frame(_))) => continue,
                Some(Err(err)) => {
                    warn!(%err, "websocket transport: read error");
                    self.failed.store(true, Ordering::SeqCst);
                    self.close_tx.fire();
                    return Err(TransportError::Io(std::io::Error::other(err.to_string())));
                }
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        self.close_tx.fire();
        let mut stream = self.stream.lock().await;
        let _ = stream.close(None).await;
        Ok(())
    }

    async fn closed(&self) {
        self.close_signal.wait().await;
    }
}
