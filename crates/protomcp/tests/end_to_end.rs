//! End-to-end scenarios wired through real transports (no mocks): a
//! provider built with [`protomcp::prelude`] accepts one duplex-pipe
//! connection while a host session drives it, covering echo round-tripping,
//! argument validation, and version downgrade.

use std::collections::HashMap;
use std::sync::Arc;

use protomcp::prelude::*;
use serde_json::{json, Value};
use tokio::io::duplex;

struct Echo;

#[async_trait]
impl ToolHandler for Echo {
    async fn call(&self, arguments: HashMap<String, Value>, _ctx: &RequestContext) -> Result<protomcp::protocol::types::ToolResult, Error> {
        let message = arguments
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| protomcp::protocol::error::invalid_argument("missing 'message'"))?;
        Ok(protomcp::protocol::types::ToolResult::text(format!("Echo: {message}")))
    }
}

struct Add;

#[async_trait]
impl ToolHandler for Add {
    async fn call(&self, arguments: HashMap<String, Value>, _ctx: &RequestContext) -> Result<protomcp::protocol::types::ToolResult, Error> {
        let a = arguments.get("a").and_then(Value::as_f64);
        let b = arguments.get("b").and_then(Value::as_f64);
        let (Some(a), Some(b)) = (a, b) else {
            let mut result = protomcp::protocol::types::ToolResult::text(
                "Invalid or missing numeric arguments 'a'/'b'",
            );
            result.is_error = true;
            return Ok(result);
        };
        Ok(protomcp::protocol::types::ToolResult::text(format!("{}", a + b)))
    }
}

async fn wire_up(server: McpServer) -> (Arc<Session>, Arc<Session>) {
    let (host_io, provider_io) = duplex(8192);
    let (host_read, host_write) = tokio::io::split(host_io);
    let (provider_read, provider_write) = tokio::io::split(provider_io);

    let provider_transport: Arc<dyn Transport> =
        Arc::new(protomcp::transport::stdio::StdioTransport::new(provider_read, provider_write));
    let host_transport: Arc<dyn Transport> =
        Arc::new(protomcp::transport::stdio::StdioTransport::new(host_read, host_write));

    let accept = tokio::spawn(async move { server.accept(provider_transport).await.unwrap() });

    let host_session = Session::connect(
        host_transport,
        Implementation { name: "test-host".to_string(), version: "0.1.0".to_string() },
        ClientCapabilities::default(),
        Arc::new(protomcp::session::Dispatcher::default()),
        protomcp::session::SessionConfig::default(),
    )
    .await
    .unwrap();

    let provider_session = accept.await.unwrap();
    (host_session, provider_session)
}

#[tokio::test]
async fn echo_round_trip() {
    let server = ServerBuilder::new("echo-server", "0.1.0")
        .tool(
            protomcp::protocol::types::ToolDefinition {
                name: "echo".to_string(),
                description: None,
                input_schema: json!({"type": "object"}),
                annotations: None,
            },
            Arc::new(Echo),
        )
        .await
        .build();

    let (host, _provider) = wire_up(server).await;

    let result = host
        .call("tools/call", Some(json!({"name": "echo", "arguments": {"message": "hi"}})), None, None)
        .await
        .result()
        .await
        .unwrap();

    assert_eq!(result["content"][0]["type"], "text");
    assert_eq!(result["content"][0]["text"], "Echo: hi");
    assert!(result.get("isError").is_none_or(|v| v == &json!(false)));
}

#[tokio::test]
async fn tool_argument_validation_reports_is_error() {
    let server = ServerBuilder::new("add-server", "0.1.0")
        .tool(
            protomcp::protocol::types::ToolDefinition {
                name: "add".to_string(),
                description: None,
                input_schema: json!({"type": "object"}),
                annotations: None,
            },
            Arc::new(Add),
        )
        .await
        .build();

    let (host, _provider) = wire_up(server).await;

    let result = host
        .call("tools/call", Some(json!({"name": "add", "arguments": {"a": 10}})), None, None)
        .await
        .result()
        .await
        .unwrap();

    assert_eq!(result["isError"], json!(true));
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Invalid or missing"));
}

#[tokio::test]
async fn version_negotiation_downgrades_to_legacy_result_shape() {
    let server = ServerBuilder::new("legacy-server", "0.1.0")
        .supported_versions(vec![ProtocolVersion::V2024_11_05])
        .tool(
            protomcp::protocol::types::ToolDefinition {
                name: "echo".to_string(),
                description: None,
                input_schema: json!({"type": "object"}),
                annotations: None,
            },
            Arc::new(Echo),
        )
        .await
        .build();

    let (host, provider) = wire_up(server).await;

    assert_eq!(host.negotiated_version().await, Some(ProtocolVersion::V2024_11_05));
    assert_eq!(provider.negotiated_version().await, Some(ProtocolVersion::V2024_11_05));

    let result = host
        .call("tools/call", Some(json!({"name": "echo", "arguments": {"message": "hi"}})), None, None)
        .await
        .result()
        .await
        .unwrap();

    assert!(result.get("content").is_some());
    assert!(result.get("output").is_none());
}
