//! The running provider server: accepts connections on
//! a transport, drives each through the handshake, and wires it to the
//! shared capability registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use protomcp_auth::{AuthHook, PermissionHook};
use protomcp_protocol::capabilities::Implementation;
use protomcp_protocol::error::Error;
use protomcp_protocol::version::ProtocolVersion;
use protomcp_registry::{
    register_default_handlers, CapabilityRegistry, ResourcesSubscribeHandler,
    ResourcesUnsubscribeHandler, SessionId,
};
use protomcp_session::{Dispatcher, Session, SessionConfig};
use protomcp_transport::Transport;
use tracing::info;

/// A provider server: immutable identity and capability catalog, mutable
/// only in the sense that accepted sessions register themselves into the
/// shared registry as they connect.
pub struct McpServer {
    server_info: Implementation,
    supported_versions: Vec<ProtocolVersion>,
    auth_hook: Option<Arc<dyn AuthHook>>,
    permission_hook: Arc<dyn PermissionHook>,
    registry: Arc<CapabilityRegistry>,
    next_session_id: AtomicU64,
}

impl McpServer {
    pub(crate) fn new(
        server_info: Implementation,
        supported_versions: Vec<ProtocolVersion>,
        auth_hook: Option<Arc<dyn AuthHook>>,
        permission_hook: Arc<dyn PermissionHook>,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        Self {
            server_info,
            supported_versions,
            auth_hook,
            permission_hook,
            registry,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// The shared capability catalog every accepted session is wired to.
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Drive one inbound connection through the provider handshake,
    /// register it with the capability registry, and return the live
    /// session. The caller owns `transport`'s lifetime (e.g. one stdio
    /// pair, one accepted socket).
    pub async fn accept(&self, transport: Arc<dyn Transport>) -> Result<Arc<Session>, Error> {
        let session_id: SessionId = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        let dispatcher = Arc::new(Dispatcher::default());
        register_default_handlers(&dispatcher, Arc::clone(&self.registry));
        dispatcher.register_handler(
            "resources/subscribe",
            Arc::new(ResourcesSubscribeHandler { registry: Arc::clone(&self.registry), session_id }),
        );
        dispatcher.register_handler(
            "resources/unsubscribe",
            Arc::new(ResourcesUnsubscribeHandler { registry: Arc::clone(&self.registry), session_id }),
        );

        let capabilities = self.registry.capabilities().await;
        let negotiated_capabilities = capabilities.clone();
        let negotiate = move |_: &protomcp_protocol::types::InitializeParams| {
            (negotiated_capabilities.clone(), None)
        };

        let session = Session::accept(
            transport,
            self.server_info.clone(),
            self.supported_versions.clone(),
            negotiate,
            dispatcher,
            self.auth_hook.clone(),
            Arc::clone(&self.permission_hook),
            SessionConfig::default(),
        )
        .await?;

        let peer: Arc<dyn protomcp_session::PeerFacilities> = Arc::clone(&session) as _;
        self.registry.register_session(session_id, peer, capabilities).await;
        self.watch_session(session_id, Arc::clone(&session));

        Ok(session)
    }

    fn watch_session(&self, session_id: SessionId, session: Arc<Session>) {
        let registry = Arc::clone(&self.registry);
        let mut status = session.subscribe_status();
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                if !*status.borrow() {
                    break;
                }
            }
            registry.unregister_session(session_id).await;
            info!(session_id, "session unregistered");
        });
    }
}
