//! The `Session`: drives one peer connection through its state machine,
//! owns the correlator and dispatcher, and serializes outbound writes
//! through a single writer task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use protomcp_auth::{AllowAll, AuthHook, PermissionHook, Principal, SessionMetadata};
use protomcp_protocol::capabilities::{ClientCapabilities, Implementation, ServerCapabilities};
use protomcp_protocol::error::{Error, ErrorKind};
use protomcp_protocol::id::RequestId;
use protomcp_protocol::jsonrpc::{Envelope, JsonRpcError, Notification, Request, Response};
use protomcp_protocol::types::{InitializeParams, InitializeResult};
use protomcp_protocol::version::ProtocolVersion;
use protomcp_transport::Transport;
use serde_json::Value;
use tokio::sync::{mpsc, watch, RwLock as AsyncRwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::context::{Cancellation, PeerFacilities, RequestContext};
use crate::correlator::{Completion, Correlator};
use crate::dispatcher::Dispatcher;
use crate::state::{SessionState, StateMachine};

/// Tunables shared by both handshake roles.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long the handshake may take before failing.
    pub handshake_timeout: Duration,
    /// The default deadline for an outbound [`Session::call`] when the
    /// caller doesn't override it.
    pub default_call_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            default_call_timeout: Duration::from_secs(60),
        }
    }
}

/// A handle the caller of [`Session::call`] uses to await the result and,
/// independently, to cancel before it resolves.
pub struct PendingCall {
    id: RequestId,
    correlator: Arc<Correlator>,
    waiter: crate::correlator::Waiter,
    outbound_tx: mpsc::Sender<Envelope>,
    timeout: Duration,
}

impl PendingCall {
    /// The id this call was sent under.
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Await the response, the configured deadline, or an external
    /// completion (cancel / session close) -- whichever comes first.
    pub async fn result(self) -> Result<Value, Error> {
        match tokio::time::timeout(self.timeout, self.waiter.wait()).await {
            Ok(Completion::Response(Ok(value))) => Ok(value),
            Ok(Completion::Response(Err(wire_error))) => Err(wire_error.into()),
            Ok(Completion::Cancelled) => Err(Error::new(ErrorKind::Cancelled, "request cancelled")),
            Ok(Completion::TimedOut) => Err(Error::new(ErrorKind::Timeout, "request timed out")),
            Ok(Completion::SessionClosed) => {
                Err(Error::new(ErrorKind::SessionClosed, "session closed"))
            }
            Err(_elapsed) => {
                let removed = self.correlator.finish(&self.id, Completion::TimedOut);
                if removed {
                    let _ = self
                        .outbound_tx
                        .send(Envelope::Notification(cancelled_notification(
                            &self.id,
                            Some("timeout"),
                        )))
                        .await;
                }
                Err(Error::new(ErrorKind::Timeout, "request timed out"))
            }
        }
    }

    /// Cancel this call locally: removes the correlator entry (if the
    /// response hasn't already arrived -- first-completion wins) and
    /// best-effort notifies the peer with a cancellation notification.
    pub async fn cancel(self) {
        let removed = self.correlator.finish(&self.id, Completion::Cancelled);
        if removed {
            let _ = self
                .outbound_tx
                .send(Envelope::Notification(cancelled_notification(
                    &self.id,
                    Some("cancelled"),
                )))
                .await;
        }
    }
}

fn cancelled_notification(id: &RequestId, reason: Option<&str>) -> Notification {
    let mut params = serde_json::json!({ "id": id.to_string() });
    if let Some(reason) = reason {
        params["reason"] = Value::String(reason.to_string());
    }
    Notification::new("$/cancelled", Some(params))
}

impl From<JsonRpcError> for Error {
    fn from(wire: JsonRpcError) -> Self {
        Error::new(ErrorKind::ToolExecutionError, wire.message)
            .with_data(wire.data.unwrap_or(Value::Null))
    }
}

/// One peer connection, symmetric across host and provider roles.
pub struct Session {
    transport: Arc<dyn Transport>,
    outbound_tx: mpsc::Sender<Envelope>,
    correlator: Arc<Correlator>,
    dispatcher: Arc<Dispatcher>,
    state: StateMachine,
    next_id: AtomicU64,
    negotiated_version: AsyncRwLock<Option<ProtocolVersion>>,
    peer_info: AsyncRwLock<Option<Implementation>>,
    peer_capabilities: AsyncRwLock<Option<Value>>,
    config: SessionConfig,
    auth_hook: Option<Arc<dyn AuthHook>>,
    permission_hook: Arc<dyn PermissionHook>,
    inbound_cancellations: Mutex<HashMap<RequestId, Cancellation>>,
    status_tx: watch::Sender<bool>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

/// A simplistic header-map style bag of connection metadata surfaced to
/// the auth hook; empty for transports with no ambient per-session
/// metadata like stdio.
pub type ConnectionMetadata = SessionMetadata;

impl Session {
    fn new(
        transport: Arc<dyn Transport>,
        dispatcher: Arc<Dispatcher>,
        config: SessionConfig,
        auth_hook: Option<Arc<dyn AuthHook>>,
        permission_hook: Arc<dyn PermissionHook>,
    ) -> (Arc<Self>, mpsc::Receiver<Envelope>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let (status_tx, _status_rx) = watch::channel(false);
        let session = Arc::new(Self {
            transport,
            outbound_tx,
            correlator: Arc::new(Correlator::default()),
            dispatcher,
            state: StateMachine::default(),
            next_id: AtomicU64::new(1),
            negotiated_version: AsyncRwLock::new(None),
            peer_info: AsyncRwLock::new(None),
            peer_capabilities: AsyncRwLock::new(None),
            config,
            auth_hook,
            permission_hook,
            inbound_cancellations: Mutex::new(HashMap::new()),
            status_tx,
            writer_task: Mutex::new(None),
            reader_task: Mutex::new(None),
        });
        (session, outbound_rx)
    }

    fn spawn_io_tasks(self: &Arc<Self>, mut outbound_rx: mpsc::Receiver<Envelope>) {
        let writer_session = Arc::clone(self);
        let writer = tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                match envelope.encode() {
                    Ok(bytes) => {
                        if let Err(err) = writer_session.transport.send(bytes).await {
                            warn!(%err, "session writer: transport send failed, closing");
                            writer_session.handle_transport_closed().await;
                            break;
                        }
                    }
                    Err(err) => error!(%err, "session writer: failed to encode envelope"),
                }
            }
        });
        *self.writer_task.lock().unwrap() = Some(writer);

        let reader_session = Arc::clone(self);
        let reader = tokio::spawn(async move {
            reader_session.reader_loop().await;
        });
        *self.reader_task.lock().unwrap() = Some(reader);
    }

    #[instrument(skip_all)]
    async fn reader_loop(self: Arc<Self>) {
        loop {
            let received = self.transport.receive().await;
            match received {
                Ok(Some(bytes)) => {
                    if let Err(err) = self.handle_inbound_bytes(&bytes).await {
                        debug!(%err, "session reader: failed to process inbound message");
                    }
                }
                Ok(None) => {
                    debug!("session reader: transport closed in an orderly way");
                    self.handle_transport_closed().await;
                    break;
                }
                Err(err) => {
                    warn!(%err, "session reader: transport error");
                    self.handle_transport_closed().await;
                    break;
                }
            }
        }
    }

    async fn handle_transport_closed(self: &Arc<Self>) {
        if self.state.force_closed() {
            self.correlator.close_all();
            let _ = self.status_tx.send(false);
        }
    }

    async fn handle_inbound_bytes(self: &Arc<Self>, bytes: &[u8]) -> Result<(), Error> {
        let envelope = match Envelope::decode(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "session reader: parse error");
                let response = Response::error_without_id(JsonRpcError::from(err));
                let _ = self.outbound_tx.send(Envelope::Response(response)).await;
                return Ok(());
            }
        };
        match envelope {
            Envelope::Response(response) => self.handle_inbound_response(response).await,
            Envelope::Request(request) => self.handle_inbound_request(request).await,
            Envelope::Notification(notification) => {
                self.handle_inbound_notification(notification).await
            }
        }
        Ok(())
    }

    async fn handle_inbound_response(self: &Arc<Self>, response: Response) {
        let Some(id) = response.id.as_request_id().cloned() else {
            debug!("session reader: response with null id, nothing to correlate");
            return;
        };
        match response.payload {
            protomcp_protocol::jsonrpc::ResponsePayload::Success { result } => {
                self.correlator.complete_response(&id, Ok(result));
            }
            protomcp_protocol::jsonrpc::ResponsePayload::Error { error } => {
                self.correlator.complete_response(&id, Err(error));
            }
        }
    }

    async fn handle_inbound_notification(self: &Arc<Self>, notification: Notification) {
        match notification.method.as_str() {
            "$/progress" => {
                if let Some(params) = notification.params {
                    if let Some(token) = params.get("token").and_then(token_key) {
                        let value = params.get("value").cloned().unwrap_or(Value::Null);
                        self.correlator.deliver_progress(&token, value);
                    }
                }
            }
            "$/cancelled" => {
                if let Some(params) = notification.params {
                    if let Some(id_str) = params.get("id").and_then(Value::as_str) {
                        self.handle_cancel_notification(id_str).await;
                    }
                }
            }
            method => {
                self.dispatcher
                    .dispatch_notification(method, notification.params)
                    .await;
            }
        }
    }

    async fn handle_cancel_notification(self: &Arc<Self>, id_str: &str) {
        // The id arrives as a string regardless of its original JSON type
        // (see `cancelled_notification`); match against both forms so a
        // numeric request id still resolves.
        let candidates = [
            RequestId::String(id_str.to_string()),
            id_str
                .parse::<i64>()
                .map(RequestId::Number)
                .unwrap_or(RequestId::String(id_str.to_string())),
        ];
        let mut cancelled_local_handler = false;
        for id in &candidates {
            let cancellation = self.inbound_cancellations.lock().unwrap().get(id).cloned();
            if let Some(cancellation) = cancellation {
                cancellation.cancel();
                cancelled_local_handler = true;
                break;
            }
        }
        if !cancelled_local_handler {
            for id in &candidates {
                if self.correlator.finish(id, Completion::Cancelled) {
                    break;
                }
            }
        }
    }

    async fn handle_inbound_request(self: &Arc<Self>, request: Request) {
        if !self.state.accepts_requests() {
            let response = Response::error(
                request.id,
                JsonRpcError::from(Error::new(
                    ErrorKind::InvalidRequest,
                    "request received before handshake completed",
                )),
            );
            let _ = self.outbound_tx.send(Envelope::Response(response)).await;
            return;
        }

        let metadata = ConnectionMetadata::default();
        let principal = match &self.auth_hook {
            Some(hook) => {
                match hook
                    .authenticate(&request.method, request.params.as_ref(), &metadata)
                    .await
                {
                    Ok(principal) => Some(principal),
                    Err(err) => {
                        let response = Response::error(request.id, JsonRpcError::from(err));
                        let _ = self.outbound_tx.send(Envelope::Response(response)).await;
                        return;
                    }
                }
            }
            None => None,
        };
        if let Some(principal) = &principal {
            if let Err(err) = self
                .permission_hook
                .check(principal, &request.method, request.params.as_ref())
                .await
            {
                let response = Response::error(request.id, JsonRpcError::from(err));
                let _ = self.outbound_tx.send(Envelope::Response(response)).await;
                return;
            }
        }

        let progress_token = request
            .params
            .as_ref()
            .and_then(|p| p.get("_meta"))
            .and_then(|m| m.get("progressToken"))
            .cloned();
        let cancellation = Cancellation::default();
        self.inbound_cancellations
            .lock()
            .unwrap()
            .insert(request.id.clone(), cancellation.clone());

        let negotiated_version = {
            let guard = self.negotiated_version.read().await;
            (*guard).unwrap_or(ProtocolVersion::PREFERRED)
        };
        let ctx = RequestContext::new(
            progress_token,
            Arc::clone(self) as Arc<dyn PeerFacilities>,
            negotiated_version,
            principal,
            cancellation,
        );

        let session = Arc::clone(self);
        let dispatcher = Arc::clone(&self.dispatcher);
        let method = request.method.clone();
        let id = request.id.clone();
        let params = request.params;
        tokio::spawn(async move {
            let result = dispatcher.dispatch_request(&method, params, ctx).await;
            session
                .inbound_cancellations
                .lock()
                .unwrap()
                .remove(&id);
            let response = match result {
                Ok(value) => Response::success(id, value),
                Err(err) => Response::error(id, JsonRpcError::from(err)),
            };
            let _ = session.outbound_tx.send(Envelope::Response(response)).await;
        });
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::from_counter(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Send a request and return a handle to await/cancel it.
    pub async fn call(
        self: &Arc<Self>,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
        progress_token: Option<Value>,
    ) -> PendingCall {
        let id = self.next_request_id();
        let mut params = params;
        if let Some(token) = &progress_token {
            let meta = serde_json::json!({ "progressToken": token });
            match &mut params {
                Some(Value::Object(map)) => {
                    map.insert("_meta".to_string(), meta);
                }
                _ => params = Some(serde_json::json!({ "_meta": meta })),
            }
        }
        let token_key = progress_token.as_ref().and_then(token_key);
        let (waiter, _progress) = self.correlator.register(id.clone(), token_key);
        let request = Request::new(id.clone(), method, params);
        let _ = self.outbound_tx.send(Envelope::Request(request)).await;
        PendingCall {
            id,
            correlator: Arc::clone(&self.correlator),
            waiter,
            outbound_tx: self.outbound_tx.clone(),
            timeout: timeout.unwrap_or(self.config.default_call_timeout),
        }
    }

    /// Register a request handler (used by `protomcp-registry`/
    /// `protomcp-server` to wire up the routing table).
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The version negotiated at handshake, if the handshake completed.
    pub async fn negotiated_version(&self) -> Option<ProtocolVersion> {
        *self.negotiated_version.read().await
    }

    /// The peer's `Implementation`, once known (post-handshake).
    pub async fn peer_info(&self) -> Option<Implementation> {
        self.peer_info.read().await.clone()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Subscribe to connection status transitions (connected/disconnected).
    pub fn subscribe_status(&self) -> watch::Receiver<bool> {
        self.status_tx.subscribe()
    }

    /// Close the session. Idempotent.
    pub async fn close(self: &Arc<Self>) {
        self.state.begin_closing();
        // Best-effort grace period for in-flight writes to flush before the
        // transport and tasks are torn down.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = self.transport.close().await;
        self.handle_transport_closed().await;
        if let Some(handle) = self.reader_task.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.writer_task.lock().unwrap().take() {
            handle.abort();
        }
    }

    // ---- Host-role handshake ----

    /// Connect as a host: send `initialize`, await the response, send
    /// `initialized`.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        client_info: Implementation,
        client_capabilities: ClientCapabilities,
        dispatcher: Arc<Dispatcher>,
        config: SessionConfig,
    ) -> Result<Arc<Self>, Error> {
        let (session, outbound_rx) =
            Self::new(transport, dispatcher, config.clone(), None, Arc::new(AllowAll));
        session.state.begin_handshake()?;
        session.spawn_io_tasks(outbound_rx);

        let params = InitializeParams {
            protocol_version: ProtocolVersion::PREFERRED.as_str().to_string(),
            capabilities: client_capabilities,
            client_info,
            trace: None,
            workspace_folders: None,
        };
        let pending = session
            .call(
                "initialize",
                Some(serde_json::to_value(&params).unwrap()),
                Some(config.handshake_timeout),
                None,
            )
            .await;
        let result = match pending.result().await {
            Ok(value) => value,
            Err(err) => {
                session.state.force_closed();
                session.correlator.close_all();
                return Err(Error::new(
                    ErrorKind::HandshakeError,
                    format!("initialize failed: {err}"),
                ));
            }
        };
        let init_result: InitializeResult = serde_json::from_value(result).map_err(|e| {
            Error::new(
                ErrorKind::HandshakeError,
                format!("malformed initialize result: {e}"),
            )
        })?;
        let negotiated = ProtocolVersion::parse(&init_result.protocol_version)?;

        *session.negotiated_version.write().await = Some(negotiated);
        *session.peer_info.write().await = Some(init_result.server_info);
        *session.peer_capabilities.write().await =
            Some(serde_json::to_value(&init_result.capabilities).unwrap());

        session
            .outbound_tx
            .send(Envelope::Notification(Notification::new(
                "initialized",
                None,
            )))
            .await
            .ok();
        session.state.complete_handshake()?;
        let _ = session.status_tx.send(true);
        Ok(session)
    }

    // ---- Provider-role handshake ----

    /// Accept a connection as a provider: wait for `initialize`, answer
    /// it, then wait for `initialized`.
    pub async fn accept(
        transport: Arc<dyn Transport>,
        server_info: Implementation,
        supported_versions: Vec<ProtocolVersion>,
        negotiate: impl Fn(&InitializeParams) -> (ServerCapabilities, Option<String>) + Send + 'static,
        dispatcher: Arc<Dispatcher>,
        auth_hook: Option<Arc<dyn AuthHook>>,
        permission_hook: Arc<dyn PermissionHook>,
        config: SessionConfig,
    ) -> Result<Arc<Self>, Error> {
        let (session, outbound_rx) = Self::new(
            Arc::clone(&transport),
            dispatcher,
            config.clone(),
            auth_hook,
            permission_hook,
        );
        session.state.begin_handshake()?;

        let seen_initialize = AtomicBool::new(false);

        // Drive the handshake directly off the transport before handing
        // control to the generic reader loop, so we can gate on the exact
        // `initialize` -> `initialized` sequence.
        let deadline = tokio::time::Instant::now() + config.handshake_timeout;
        loop {
            let received = tokio::time::timeout_at(deadline, transport.receive()).await;
            let bytes = match received {
                Ok(Ok(Some(bytes))) => bytes,
                Ok(Ok(None)) => {
                    return Err(Error::new(
                        ErrorKind::HandshakeError,
                        "peer closed before initialize",
                    ))
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_elapsed) => {
                    return Err(Error::new(ErrorKind::HandshakeError, "handshake timed out"))
                }
            };
            let envelope = Envelope::decode(&bytes)?;
            match envelope {
                Envelope::Request(request) if request.method == "initialize" && !seen_initialize.load(Ordering::SeqCst) =>
                {
                    seen_initialize.store(true, Ordering::SeqCst);
                    let params: InitializeParams = request
                        .params
                        .clone()
                        .map(serde_json::from_value)
                        .transpose()
                        .map_err(|e| {
                            Error::new(ErrorKind::InvalidParams, format!("bad initialize params: {e}"))
                        })?
                        .ok_or_else(|| {
                            Error::new(ErrorKind::InvalidParams, "initialize requires params")
                        })?;
                    let requested = ProtocolVersion::parse(&params.protocol_version);
                    let negotiated = match requested {
                        Ok(v) if supported_versions.contains(&v) => v,
                        _ => *supported_versions
                            .first()
                            .ok_or_else(|| {
                                Error::new(
                                    ErrorKind::UnsupportedProtocolVersion,
                                    "provider supports no protocol versions",
                                )
                            })?,
                    };
                    let (capabilities, instructions) = negotiate(&params);
                    let result = InitializeResult {
                        protocol_version: negotiated.as_str().to_string(),
                        capabilities,
                        server_info: server_info.clone(),
                        instructions,
                    };
                    let response = Response::success(
                        request.id,
                        serde_json::to_value(&result).unwrap(),
                    );
                    transport.send(Envelope::Response(response).encode()?).await?;
                    *session.negotiated_version.write().await = Some(negotiated);
                    *session.peer_info.write().await = Some(params.client_info);
                    *session.peer_capabilities.write().await =
                        Some(serde_json::to_value(&params.capabilities).unwrap());
                }
                Envelope::Notification(n) if n.method == "initialized" => {
                    if !seen_initialize.load(Ordering::SeqCst) {
                        continue;
                    }
                    break;
                }
                Envelope::Request(request) => {
                    let response = Response::error(
                        request.id,
                        JsonRpcError::from(Error::new(
                            ErrorKind::InvalidRequest,
                            format!("expected 'initialize', got '{}'", request.method),
                        )),
                    );
                    transport.send(Envelope::Response(response).encode()?).await?;
                }
                _ => continue,
            }
        }

        session.state.complete_handshake()?;
        let _ = session.status_tx.send(true);
        session.spawn_io_tasks(outbound_rx);
        Ok(session)
    }
}

fn token_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl PeerFacilities for Session {
    async fn notify(&self, method: &str, params: Option<Value>) {
        let _ = self
            .outbound_tx
            .send(Envelope::Notification(Notification::new(method, params)))
            .await;
    }

    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, Error> {
        let id = self.next_request_id();
        let (waiter, _progress) = self.correlator.register(id.clone(), None);
        let request = Request::new(id.clone(), method, params);
        let _ = self.outbound_tx.send(Envelope::Request(request)).await;
        let pending = PendingCall {
            id,
            correlator: Arc::clone(&self.correlator),
            waiter,
            outbound_tx: self.outbound_tx.clone(),
            timeout: self.config.default_call_timeout,
        };
        pending.result().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protomcp_protocol::capabilities::ServerCapabilities;
    use protomcp_transport::stdio::StdioTransport;
    use tokio::io::duplex;

    fn client_info() -> Implementation {
        Implementation {
            name: "test-client".into(),
            version: "0.1.0".into(),
        }
    }

    fn server_info() -> Implementation {
        Implementation {
            name: "test-server".into(),
            version: "0.1.0".into(),
        }
    }

    async fn connected_pair() -> (Arc<Session>, Arc<Session>) {
        let (client_io, server_io) = duplex(8192);
        let (client_r, client_w) = tokio::io::split(client_io);
        let (server_r, server_w) = tokio::io::split(server_io);
        let client_transport: Arc<dyn Transport> =
            Arc::new(StdioTransport::new(client_r, client_w));
        let server_transport: Arc<dyn Transport> =
            Arc::new(StdioTransport::new(server_r, server_w));

        let client_dispatcher = Arc::new(Dispatcher::default());
        let server_dispatcher = Arc::new(Dispatcher::default());

        let server_fut = Session::accept(
            server_transport,
            server_info(),
            vec![ProtocolVersion::PREFERRED],
            |_params| (ServerCapabilities::default(), None),
            server_dispatcher,
            None,
            Arc::new(AllowAll),
            SessionConfig::default(),
        );
        let client_fut = Session::connect(
            client_transport,
            client_info(),
            ClientCapabilities::default(),
            client_dispatcher,
            SessionConfig::default(),
        );
        let (server, client) = tokio::join!(server_fut, client_fut);
        (client.unwrap(), server.unwrap())
    }

    #[tokio::test]
    async fn handshake_reaches_active_on_both_sides() {
        let (client, server) = connected_pair().await;
        assert_eq!(client.state(), SessionState::Active);
        assert_eq!(server.state(), SessionState::Active);
        assert_eq!(
            client.peer_info().await.unwrap().name,
            "test-server"
        );
        assert_eq!(server.peer_info().await.unwrap().name, "test-client");
    }

    #[tokio::test]
    async fn call_round_trips_through_registered_handler() {
        let (client, server) = connected_pair().await;

        struct Echo;
        #[async_trait]
        impl crate::dispatcher::RequestHandler for Echo {
            async fn handle(
                &self,
                params: Option<Value>,
                _ctx: RequestContext,
            ) -> Result<Value, Error> {
                Ok(params.unwrap_or(Value::Null))
            }
        }
        server.dispatcher().register_handler("echo", Arc::new(Echo));

        let pending = client
            .call("echo", Some(serde_json::json!({"x": 1})), None, None)
            .await;
        let result = pending.result().await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found_over_the_wire() {
        let (client, _server) = connected_pair().await;
        let pending = client.call("nonexistent", None, None, None).await;
        let err = pending.result().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ToolExecutionError);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_releases_pending_calls() {
        let (client, _server) = connected_pair().await;
        client.close().await;
        client.close().await;
        assert_eq!(client.state(), SessionState::Closed);
    }
}
