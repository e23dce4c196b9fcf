//! Thin facade over the `protomcp-*` workspace: a JSON-RPC runtime for
//! MCP-shaped client/server exchanges (envelope codec, transports,
//! sessions, capability registry, auth hooks, subprocess supervision).
//!
//! Most callers only need [`prelude`].

pub use protomcp_auth as auth;
pub use protomcp_client as client;
pub use protomcp_protocol as protocol;
pub use protomcp_registry as registry;
pub use protomcp_server as server;
pub use protomcp_session as session;
pub use protomcp_transport as transport;

/// Everything a typical host or provider needs in scope.
pub mod prelude {
    pub use protomcp_auth::{AllowAll, AuthHook, Principal};
    pub use protomcp_client::{
        ConnectionError, LaunchSpec, ManagedSession, ServerConfig, ServerEndpoint, SessionRegistry,
        Supervisor,
    };
    pub use protomcp_protocol::capabilities::{
        ClientCapabilities, Implementation, ServerCapabilities,
    };
    pub use protomcp_protocol::error::{Error, ErrorKind};
    pub use protomcp_protocol::version::ProtocolVersion;
    pub use protomcp_registry::{CapabilityRegistry, PromptHandler, ResourceHandler, ToolHandler};
    pub use protomcp_server::{McpServer, ServerBuilder};
    pub use protomcp_session::{RequestContext, Session, SessionState};
    pub use protomcp_transport::Transport;

    pub use async_trait::async_trait;
}
