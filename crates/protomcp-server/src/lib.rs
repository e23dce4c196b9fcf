//! Provider-side server: wires `protomcp-session`'s `Session::accept` to a
//! shared `protomcp-registry::CapabilityRegistry`, with optional
//! `protomcp-auth` hooks.

pub mod builder;
pub mod server;

pub use builder::ServerBuilder;
pub use server::McpServer;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use protomcp_protocol::types::{ToolDefinition, ToolResult};
    use protomcp_registry::ToolHandler;
    use protomcp_session::{Dispatcher, RequestContext};
    use protomcp_transport::stdio::StdioTransport;
    use serde_json::Value;
    use std::collections::HashMap;
    use tokio::io::duplex;

    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(
            &self,
            arguments: HashMap<String, Value>,
            _ctx: &RequestContext,
        ) -> Result<ToolResult, protomcp_protocol::error::Error> {
            Ok(ToolResult {
                content: vec![],
                output: Some(Value::Object(arguments.into_iter().collect())),
                is_error: false,
            })
        }
    }

    #[tokio::test]
    async fn accept_negotiates_and_registers_a_session() {
        let server = ServerBuilder::new("test-server", "0.1.0")
            .tool(
                ToolDefinition {
                    name: "echo".to_string(),
                    description: None,
                    input_schema: serde_json::json!({"type": "object"}),
                    annotations: None,
                },
                Arc::new(Echo),
            )
            .await
            .build();

        let (host_io, provider_io) = duplex(4096);
        let (host_read, host_write) = tokio::io::split(host_io);
        let (provider_read, provider_write) = tokio::io::split(provider_io);

        let provider_transport: Arc<dyn protomcp_transport::Transport> =
            Arc::new(StdioTransport::new(provider_read, provider_write));
        let host_transport: Arc<dyn protomcp_transport::Transport> =
            Arc::new(StdioTransport::new(host_read, host_write));

        let accept = tokio::spawn(async move { server.accept(provider_transport).await });

        let client_info = protomcp_protocol::capabilities::Implementation {
            name: "test-client".to_string(),
            version: "0.1.0".to_string(),
        };
        let host_session = protomcp_session::Session::connect(
            host_transport,
            client_info,
            protomcp_protocol::capabilities::ClientCapabilities::default(),
            Arc::new(Dispatcher::default()),
            protomcp_session::SessionConfig::default(),
        )
        .await
        .unwrap();

        let provider_session = accept.await.unwrap().unwrap();
        assert_eq!(
            provider_session.state(),
            protomcp_session::SessionState::Active
        );
        assert_eq!(host_session.state(), protomcp_session::SessionState::Active);
    }
}
