//! Fluent builder for constructing a provider-side [`McpServer`].

use std::sync::Arc;

use protomcp_auth::{AllowAll, AuthHook, PermissionHook};
use protomcp_protocol::capabilities::Implementation;
use protomcp_protocol::error::Error;
use protomcp_protocol::types::{
    PromptDefinition, ResourceDefinition, ResourceTemplateDefinition, ToolDefinition,
};
use protomcp_protocol::version::ProtocolVersion;
use protomcp_registry::{CapabilityRegistry, PromptHandler, ResourceHandler, ToolHandler};

use crate::server::McpServer;

/// Builds an [`McpServer`] one capability at a time, mirroring the
/// teacher's consuming-builder shape. Registration is async (the
/// registry is lock-guarded), so each capability method returns a future
/// rather than chaining synchronously.
pub struct ServerBuilder {
    server_info: Implementation,
    supported_versions: Vec<ProtocolVersion>,
    auth_hook: Option<Arc<dyn AuthHook>>,
    permission_hook: Arc<dyn PermissionHook>,
    registry: Arc<CapabilityRegistry>,
}

impl ServerBuilder {
    /// Start building a server identifying itself as `name`/`version`.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            server_info: Implementation { name: name.into(), version: version.into() },
            supported_versions: ProtocolVersion::SUPPORTED.to_vec(),
            auth_hook: None,
            permission_hook: Arc::new(AllowAll),
            registry: Arc::new(CapabilityRegistry::new()),
        }
    }

    /// Restrict the protocol versions this server will negotiate, most
    /// preferred first. Defaults to [`ProtocolVersion::SUPPORTED`].
    #[must_use]
    pub fn supported_versions(mut self, versions: Vec<ProtocolVersion>) -> Self {
        self.supported_versions = versions;
        self
    }

    /// Install the auth hook run once per inbound request.
    #[must_use]
    pub fn auth_hook(mut self, hook: Arc<dyn AuthHook>) -> Self {
        self.auth_hook = Some(hook);
        self
    }

    /// Install the permission hook run after authentication. Defaults to
    /// [`AllowAll`].
    #[must_use]
    pub fn permission_hook(mut self, hook: Arc<dyn PermissionHook>) -> Self {
        self.permission_hook = hook;
        self
    }

    /// Register a tool.
    pub async fn tool(self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        self.registry.register_tool(definition, handler).await;
        self
    }

    /// Register a concrete resource.
    pub async fn resource(self, definition: ResourceDefinition, handler: Arc<dyn ResourceHandler>) -> Self {
        self.registry.register_resource(definition, handler).await;
        self
    }

    /// Register a URI-templated resource family.
    ///
    /// # Errors
    ///
    /// Returns an error if `definition.uri_template` fails to parse.
    pub async fn resource_template(
        self,
        definition: ResourceTemplateDefinition,
        handler: Arc<dyn ResourceHandler>,
    ) -> Result<Self, Error> {
        self.registry.register_resource_template(definition, handler).await?;
        Ok(self)
    }

    /// Register a prompt.
    pub async fn prompt(self, definition: PromptDefinition, handler: Arc<dyn PromptHandler>) -> Self {
        self.registry.register_prompt(definition, handler).await;
        self
    }

    /// Finish building the server.
    #[must_use]
    pub fn build(self) -> McpServer {
        McpServer::new(
            self.server_info,
            self.supported_versions,
            self.auth_hook,
            self.permission_hook,
            self.registry,
        )
    }
}
