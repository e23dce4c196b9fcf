//! Length-prefixed or newline-delimited socket transport,
//! generic over any `AsyncRead + AsyncWrite` stream so it backs both Unix
//! domain sockets and TCP sockets without duplicating framing logic.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};
use crate::traits::{CloseSignal, CloseSignalSender, Transport, TransportMessage};

/// How message boundaries are marked on the wire. Chosen at session
/// construction time ("implementation-selected").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// A 4-byte big-endian length prefix followed by that many bytes.
    LengthPrefixed,
    /// One JSON value per line, LF-terminated.
    NewlineDelimited,
}

/// A length-prefixed or newline-delimited socket transport.
pub struct SocketTransport<S> {
    stream: AsyncMutex<S>,
    framing: Framing,
    failed: AtomicBool,
    close_tx: CloseSignalSender,
    close_signal: CloseSignal,
}

const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

impl<S> SocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream (one accept, one session).
    pub fn new(stream: S, framing: Framing) -> Self {
        let (close_tx, close_signal) = CloseSignal::channel();
        Self {
            stream: AsyncMutex::new(stream),
            framing,
            failed: AtomicBool::new(false),
            close_tx,
            close_signal,
        }
    }

    fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
        self.close_tx.fire();
    }
}

#[async_trait]
impl<S> Transport for SocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&self, message: TransportMessage) -> TransportResult<()> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut stream = self.stream.lock().await;
        let result: TransportResult<()> = async {
            match self.framing {
                Framing::LengthPrefixed => {
                    let len: u32 = message
                        .len()
                        .try_into()
                        .map_err(|_| TransportError::Framing("message too large".into()))?;
                    stream.write_all(&len.to_be_bytes()).await?;
                    stream.write_all(&message).await?;
                }
                Framing::NewlineDelimited => {
                    if message.contains(&b'\n') {
                        return Err(TransportError::Framing(
                            "message contains an embedded newline".into(),
                        ));
                    }
                    stream.write_all(&message).await?;
                    stream.write_all(b"\n").await?;
                }
            }
            stream.flush().await?;
            Ok(())
        }
        .await;
        if result.is_err() {
            self.mark_failed();
        }
        result
    }

    async fn receive(&self) -> TransportResult<Option<TransportMessage>> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut stream = self.stream.lock().await;
        match self.framing {
            Framing::LengthPrefixed => {
                let mut len_buf = [0u8; 4];
                match stream.read_exact(&mut len_buf).await {
                    Ok(_) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                        debug!("socket transport: peer closed (EOF on length prefix)");
                        self.close_tx.fire();
                        return Ok(None);
                    }
                    Err(err) => {
                        self.mark_failed();
                        return Err(err.into());
                    }
                }
                let len = u32::from_be_bytes(len_buf);
                if len > MAX_FRAME_LEN {
                    self.mark_failed();
                    return Err(TransportError::Framing(format!(
                        "frame length {len} exceeds max {MAX_FRAME_LEN}"
                    )));
                }
                let mut body = vec![0u8; len as usize];
                if let Err(err) = stream.read_exact(&mut body).await {
                    self.mark_failed();
                    return Err(err.into());
                }
                Ok(Some(body))
            }
            Framing::NewlineDelimited => {
                let mut line = Vec::new();
                let mut byte = [0u8; 1];
                loop {
                    match stream.read(&mut byte).await {
                        Ok(0) if line.is_empty() => {
                            debug!("socket transport: peer closed (EOF)");
                            self.close_tx.fire();
                            return Ok(None);
                        }
                        Ok(0) => return Ok(Some(line)),
                        Ok(_) if byte[0] == b'\n' => return Ok(Some(line)),
                        Ok(_) => line.push(byte[0]),
                        Err(err) => {
                            warn!(%err, "socket transport: read error");
                            self.mark_failed();
                            return Err(err.into());
                        }
                    }
                }
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        self.close_tx.fire();
        let mut stream = self.stream.lock().await;
        let _ = stream.shutdown().await;
        Ok(())
    }

    async fn closed(&self) {
        self.close_signal.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn length_prefixed_round_trip() {
        let (a, b) = duplex(4096);
        let client = SocketTransport::new(a, Framing::LengthPrefixed);
        let server = SocketTransport::new(b, Framing::LengthPrefixed);
        client.send(b"ping".to_vec()).await.unwrap();
        let received = server.receive().await.unwrap().unwrap();
        assert_eq!(received, b"ping");
    }

    #[tokio::test]
    async fn newline_delimited_round_trip() {
        let (a, b) = duplex(4096);
        let client = SocketTransport::new(a, Framing::NewlineDelimited);
        let server = SocketTransport::new(b, Framing::NewlineDelimited);
        client.send(b"ping".to_vec()).await.unwrap();
        let received = server.receive().await.unwrap().unwrap();
        assert_eq!(received, b"ping");
    }

    #[tokio::test]
    async fn ordering_preserved_for_two_sends() {
        let (a, b) = duplex(4096);
        let client = SocketTransport::new(a, Framing::LengthPrefixed);
        let server = SocketTransport::new(b, Framing::LengthPrefixed);
        client.send(b"first".to_vec()).await.unwrap();
        client.send(b"second".to_vec()).await.unwrap();
        assert_eq!(server.receive().await.unwrap().unwrap(), b"first");
        assert_eq!(server.receive().await.unwrap().unwrap(), b"second");
    }
}
