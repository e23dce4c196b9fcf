//! Session registry: owns every connection a host has open, builds
//! the right transport per configured endpoint, and fans out connection
//! status.

use std::collections::HashMap;
use std::sync::Arc;

use protomcp_protocol::capabilities::{ClientCapabilities, Implementation};
use protomcp_protocol::error::{operation_failed, session_closed, Error};
use protomcp_session::{Dispatcher, Session, SessionConfig, SessionState};
use protomcp_transport::socket::{Framing, SocketTransport};
use protomcp_transport::sse::SseTransport;
use protomcp_transport::websocket::WebSocketTransport;
use protomcp_transport::Transport;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::config::{ServerConfig, ServerEndpoint};
use crate::supervisor::{Supervisor, TerminationConfig};

/// Reported when a managed session observes a transport/process failure,
/// forming a connection-error stream callers can drain alongside the
/// registry.
#[derive(Debug)]
pub struct ConnectionError {
    /// The server name the error belongs to.
    pub name: String,
    /// The underlying error.
    pub error: Error,
}

/// A session the registry owns, plus its supervised process if the
/// transport is a local subprocess.
#[derive(Clone)]
pub struct ManagedSession {
    /// The live session.
    pub session: Arc<Session>,
    supervisor: Option<Arc<Supervisor>>,
}

impl ManagedSession {
    /// The supervised child process, if this session's transport is a
    /// local subprocess.
    pub fn supervisor(&self) -> Option<&Arc<Supervisor>> {
        self.supervisor.as_ref()
    }
}

/// Owns every server connection a host process has open. `sessions` is
/// shared with the watcher task spawned per session so a session going
/// inactive can remove its own entry without the owner having to poll.
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, ManagedSession>>>,
    client_info: Implementation,
    client_capabilities: ClientCapabilities,
    errors_tx: mpsc::UnboundedSender<ConnectionError>,
}

impl SessionRegistry {
    /// Build an empty registry, returning the connection-error stream
    /// callers should drain alongside it.
    pub fn new(
        client_info: Implementation,
        client_capabilities: ClientCapabilities,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionError>) {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        (
            Self {
                sessions: Arc::new(Mutex::new(HashMap::new())),
                client_info,
                client_capabilities,
                errors_tx,
            },
            errors_rx,
        )
    }

    /// Load a server configuration document and eagerly connect to every
    /// entry, continuing past individual connection failures (reported on
    /// the error stream) rather than aborting the whole batch.
    pub async fn connect_all(&mut self, config: &ServerConfig, dispatcher: Arc<Dispatcher>) {
        for (name, endpoint) in &config.servers {
            if let Err(err) = self.connect(name.clone(), endpoint, Arc::clone(&dispatcher)).await {
                warn!(server = %name, %err, "failed to connect configured server");
                let _ = self.errors_tx.send(ConnectionError { name: name.clone(), error: err });
            }
        }
    }

    /// Connect to a single endpoint and register it under `name`,
    /// replacing any prior session of the same name.
    pub async fn connect(
        &mut self,
        name: String,
        endpoint: &ServerEndpoint,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<(), Error> {
        let (transport, supervisor): (Arc<dyn Transport>, Option<Arc<Supervisor>>) = match endpoint {
            ServerEndpoint::Subprocess(spec) => {
                let (supervisor, transport) =
                    Supervisor::spawn(&name, spec, TerminationConfig::default())?;
                (Arc::new(transport), Some(Arc::new(supervisor)))
            }
            ServerEndpoint::Sse(url) => {
                let transport = SseTransport::connect(url, url).await?;
                (Arc::new(transport), None)
            }
            ServerEndpoint::WebSocket(url) => {
                let transport = WebSocketTransport::connect(url).await?;
                (Arc::new(transport), None)
            }
            ServerEndpoint::Unix(path) => {
                let stream = UnixStream::connect(path).await.map_err(|err| {
                    operation_failed(format!("failed to connect unix socket '{path}': {err}"))
                })?;
                let transport = SocketTransport::new(stream, Framing::NewlineDelimited);
                (Arc::new(transport), None)
            }
        };

        let session = Session::connect(
            transport,
            self.client_info.clone(),
            self.client_capabilities.clone(),
            dispatcher,
            SessionConfig::default(),
        )
        .await?;

        self.watch_session(name.clone(), Arc::clone(&session), supervisor.clone());
        self.sessions
            .lock()
            .await
            .insert(name, ManagedSession { session, supervisor });
        Ok(())
    }

    /// Connect directly to an already-built transport, bypassing
    /// configuration-file resolution entirely (for transports a caller
    /// builds by hand rather than describes in a [`ServerConfig`]).
    pub async fn connect_transport(
        &mut self,
        name: String,
        transport: Arc<dyn Transport>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<(), Error> {
        let session = Session::connect(
            transport,
            self.client_info.clone(),
            self.client_capabilities.clone(),
            dispatcher,
            SessionConfig::default(),
        )
        .await?;
        self.watch_session(name.clone(), Arc::clone(&session), None);
        self.sessions
            .lock()
            .await
            .insert(name, ManagedSession { session, supervisor: None });
        Ok(())
    }

    /// Watch a session's status, and on it going inactive, remove its
    /// entry from the shared session map and report the failure on the
    /// connection-error stream. When the session is backed by a supervised
    /// subprocess, its exit code is fetched (terminating it if it somehow
    /// hasn't exited yet) and surfaced whenever it is non-zero.
    fn watch_session(
        &self,
        name: String,
        session: Arc<Session>,
        supervisor: Option<Arc<Supervisor>>,
    ) {
        let mut status = session.subscribe_status();
        let errors_tx = self.errors_tx.clone();
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let active = *status.borrow();
                if !active && session.state() != SessionState::Closed {
                    continue;
                }
                if !active {
                    sessions.lock().await.remove(&name);

                    let exit_code = match &supervisor {
                        Some(supervisor) => supervisor.terminate().await.code,
                        None => None,
                    };
                    match exit_code {
                        Some(code) if code != 0 => {
                            warn!(server = %name, code, "session closed, subprocess exited non-zero");
                            let _ = errors_tx.send(ConnectionError {
                                name: name.clone(),
                                error: operation_failed(format!(
                                    "subprocess exited with status {code}"
                                )),
                            });
                        }
                        _ => {
                            info!(server = %name, "session closed");
                            let _ = errors_tx.send(ConnectionError {
                                name: name.clone(),
                                error: session_closed("session closed"),
                            });
                        }
                    }
                    break;
                }
            }
        });
    }

    /// Look up a managed session by name.
    pub async fn get(&self, name: &str) -> Option<ManagedSession> {
        self.sessions.lock().await.get(name).cloned()
    }

    /// Every managed session, by name.
    pub async fn iter(&self) -> Vec<(String, ManagedSession)> {
        self.sessions
            .lock()
            .await
            .iter()
            .map(|(name, managed)| (name.clone(), managed.clone()))
            .collect()
    }

    /// Every session currently in the `Active` state.
    pub async fn active_sessions(&self) -> Vec<(String, ManagedSession)> {
        self.sessions
            .lock()
            .await
            .iter()
            .filter(|(_, managed)| managed.session.state() == SessionState::Active)
            .map(|(name, managed)| (name.clone(), managed.clone()))
            .collect()
    }

    /// Close every managed session and reap every supervised child,
    /// running the termination protocol for each. Idempotent.
    pub async fn stop_all(&mut self) {
        let drained: Vec<(String, ManagedSession)> = self.sessions.lock().await.drain().collect();
        for (name, managed) in drained {
            managed.session.close().await;
            if let Some(supervisor) = managed.supervisor {
                supervisor.terminate().await;
            }
            info!(server = %name, "stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_info() -> Implementation {
        Implementation { name: "test-host".to_string(), version: "0.0.0".to_string() }
    }

    #[tokio::test]
    async fn connect_all_reports_failures_without_aborting() {
        let (mut registry, mut errors) = SessionRegistry::new(client_info(), ClientCapabilities::default());
        let config = ServerConfig::parse(
            r#"{"mcpServers": {"missing": {"command": "definitely-not-a-real-binary-xyz"}}}"#,
        )
        .unwrap();
        registry.connect_all(&config, Arc::new(Dispatcher::default())).await;
        let err = errors.recv().await.unwrap();
        assert_eq!(err.name, "missing");
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn stop_all_is_idempotent_on_empty_registry() {
        let (mut registry, _errors) = SessionRegistry::new(client_info(), ClientCapabilities::default());
        registry.stop_all().await;
        registry.stop_all().await;
    }
}
