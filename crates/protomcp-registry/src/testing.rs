//! Minimal tools used only by this crate's and downstream crates' own
//! integration tests, never registered outside `#[cfg(test)]`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use protomcp_protocol::error::{invalid_argument, Error};
use protomcp_protocol::types::{ToolAnnotations, ToolDefinition, ToolResult};
use protomcp_session::RequestContext;
use serde_json::Value;

use crate::registry::{CapabilityRegistry, ToolHandler};

struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(
        &self,
        arguments: HashMap<String, Value>,
        _ctx: &RequestContext,
    ) -> Result<ToolResult, Error> {
        let message = arguments
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid_argument("missing 'message'"))?;
        Ok(ToolResult::text(format!("Echo: {message}")))
    }
}

struct AddTool;

#[async_trait]
impl ToolHandler for AddTool {
    async fn call(
        &self,
        arguments: HashMap<String, Value>,
        _ctx: &RequestContext,
    ) -> Result<ToolResult, Error> {
        let a = arguments.get("a").and_then(Value::as_f64);
        let b = arguments.get("b").and_then(Value::as_f64);
        let (Some(a), Some(b)) = (a, b) else {
            return Ok(ToolResult::error("Invalid or missing numeric arguments 'a'/'b'"));
        };
        Ok(ToolResult {
            content: vec![protomcp_protocol::content::Content::text((a + b).to_string())],
            output: Some(serde_json::json!({ "sum": a + b })),
            is_error: false,
        })
    }
}

/// Register the `echo` and `add` tools on `registry` for use by test code
/// that needs a live registry with real round-trippable entries.
pub async fn register_test_tools(registry: &CapabilityRegistry) {
    registry
        .register_tool(
            ToolDefinition {
                name: "echo".to_string(),
                description: Some("Echo the given message back, prefixed".to_string()),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": { "message": { "type": "string" } },
                    "required": ["message"],
                }),
                annotations: Some(ToolAnnotations {
                    read_only_hint: true,
                    idempotent_hint: true,
                    ..Default::default()
                }),
            },
            Arc::new(EchoTool),
        )
        .await;
    registry
        .register_tool(
            ToolDefinition {
                name: "add".to_string(),
                description: Some("Add two numbers".to_string()),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "a": { "type": "number" },
                        "b": { "type": "number" },
                    },
                    "required": ["a", "b"],
                }),
                annotations: Some(ToolAnnotations {
                    read_only_hint: true,
                    idempotent_hint: true,
                    ..Default::default()
                }),
            },
            Arc::new(AddTool),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use protomcp_protocol::version::ProtocolVersion;
    use protomcp_session::{Cancellation, PeerFacilities};

    struct NoopPeer;
    #[async_trait]
    impl PeerFacilities for NoopPeer {
        async fn notify(&self, _method: &str, _params: Option<Value>) {}
        async fn call(&self, _method: &str, _params: Option<Value>) -> Result<Value, Error> {
            Ok(Value::Null)
        }
    }

    fn test_ctx() -> RequestContext {
        RequestContext::new(
            None,
            Arc::new(NoopPeer),
            ProtocolVersion::PREFERRED,
            None,
            Cancellation::default(),
        )
    }

    #[tokio::test]
    async fn echo_returns_prefixed_message() {
        let registry = CapabilityRegistry::new();
        register_test_tools(&registry).await;
        let mut args = HashMap::new();
        args.insert("message".to_string(), serde_json::json!("hi"));
        let result = registry.call_tool("echo", args, &test_ctx()).await.unwrap();
        assert_eq!(result.content.len(), 1);
        assert_eq!(
            result.content[0],
            protomcp_protocol::content::Content::text("Echo: hi")
        );
    }

    #[tokio::test]
    async fn add_reports_is_error_on_non_numeric_argument() {
        let registry = CapabilityRegistry::new();
        register_test_tools(&registry).await;
        let mut args = HashMap::new();
        args.insert("a".to_string(), serde_json::json!("not a number"));
        args.insert("b".to_string(), serde_json::json!(2));
        let result = registry.call_tool("add", args, &test_ctx()).await.unwrap();
        assert!(result.is_error);
        let protomcp_protocol::content::Content::Text { text } = &result.content[0] else {
            panic!("expected text content");
        };
        assert!(text.contains("Invalid or missing"));
    }

    #[tokio::test]
    async fn add_sums_two_numbers() {
        let registry = CapabilityRegistry::new();
        register_test_tools(&registry).await;
        let mut args = HashMap::new();
        args.insert("a".to_string(), serde_json::json!(2));
        args.insert("b".to_string(), serde_json::json!(3));
        let result = registry.call_tool("add", args, &test_ctx()).await.unwrap();
        assert_eq!(result.output, Some(serde_json::json!({"sum": 5.0})));
    }
}
