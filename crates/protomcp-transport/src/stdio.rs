//! Stdio transport: one JSON value per line, LF-terminated.
//!
//! Generic over the reader/writer halves so the same implementation backs
//! both a supervised child's pipes (`protomcp-client`'s subprocess
//! supervisor) and a host process's own stdin/stdout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, trace, warn};

use crate::error::{TransportError, TransportResult};
use crate::traits::{CloseSignal, CloseSignalSender, Transport, TransportMessage};

/// Stdio transport over arbitrary async byte streams.
pub struct StdioTransport<R, W> {
    reader: AsyncMutex<BufReader<R>>,
    writer: AsyncMutex<W>,
    failed: AtomicBool,
    close_tx: CloseSignalSender,
    close_signal: CloseSignal,
    // Guards against two concurrent `close` calls double-shutting-down
    // the writer; cheap and never held across an `.await` point besides
    // the shutdown call itself.
    closing: StdMutex<bool>,
}

impl<R, W> StdioTransport<R, W>
where
    R: tokio::io::AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap a reader/writer pair as a line-framed stdio transport.
    pub fn new(reader: R, writer: W) -> Self {
        let (close_tx, close_signal) = CloseSignal::channel();
        Self {
            reader: AsyncMutex::new(BufReader::new(reader)),
            writer: AsyncMutex::new(writer),
            failed: AtomicBool::new(false),
            close_tx,
            close_signal,
            closing: StdMutex::new(false),
        }
    }

    fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
        self.close_tx.fire();
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: tokio::io::AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, message: TransportMessage) -> TransportResult<()> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if message.contains(&b'\n') {
            return Err(TransportError::Framing(
                "message contains an embedded newline".into(),
            ));
        }
        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(&message).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(err) = result {
            self.mark_failed();
            return Err(err.into());
        }
        Ok(())
    }

    async fn receive(&self) -> TransportResult<Option<TransportMessage>> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("stdio transport: peer closed (EOF)");
                self.close_tx.fire();
                Ok(None)
            }
            Ok(_) => {
                trace!(bytes = line.len(), "stdio transport: read one line");
                let trimmed = line.trim_end_matches(['\n', '\r']);
                Ok(Some(trimmed.as_bytes().to_vec()))
            }
            Err(err) => {
                warn!(%err, "stdio transport: read error");
                self.mark_failed();
                Err(err.into())
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        let mut closing = self.closing.lock().unwrap();
        if *closing {
            return Ok(());
        }
        *closing = true;
        drop(closing);
        self.close_tx.fire();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        Ok(())
    }

    async fn closed(&self) {
        self.close_signal.wait().await;
    }
}
