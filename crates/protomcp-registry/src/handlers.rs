//! Per-method `RequestHandler` adapters that translate generic JSON params
//! into typed [`CapabilityRegistry`] calls.

use std::sync::Arc;

use async_trait::async_trait;
use protomcp_protocol::error::{Error, ErrorKind};
use protomcp_protocol::types::{CallToolParams, GetPromptParams, ListParams, ReadResourceParams};
use protomcp_session::{RequestContext, RequestHandler};
use serde_json::Value;

use crate::registry::CapabilityRegistry;

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, Error> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params)
        .map_err(|err| Error::new(ErrorKind::InvalidParams, format!("malformed params: {err}")))
}

/// `tools/list`.
pub struct ToolsListHandler(pub Arc<CapabilityRegistry>);

#[async_trait]
impl RequestHandler for ToolsListHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
        let list: ListParams = parse_params(params)?;
        let page = self.0.list_tools(list.cursor.as_deref()).await?;
        Ok(serde_json::json!({ "tools": page.items, "nextCursor": page.next_cursor }))
    }
}

/// `tools/call`. A legacy peer sends flat `{name, arguments}`; a
/// new-version peer may additionally or instead send a nested `tool_call`
/// object. [`CallToolParams::resolve`] picks the authoritative pair by
/// negotiated version before dispatch; the *result* shape is likewise
/// version-dependent, handled by `ToolResult::for_version`.
pub struct ToolsCallHandler(pub Arc<CapabilityRegistry>);

#[async_trait]
impl RequestHandler for ToolsCallHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, Error> {
        let call: CallToolParams = parse_params(params)?;
        let (name, arguments) = call.resolve(ctx.negotiated_version());
        let result = self.0.call_tool(&name, arguments, &ctx).await?;
        Ok(result.for_version(ctx.negotiated_version()))
    }
}

/// `resources/list`.
pub struct ResourcesListHandler(pub Arc<CapabilityRegistry>);

#[async_trait]
impl RequestHandler for ResourcesListHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
        let list: ListParams = parse_params(params)?;
        let page = self.0.list_resources(list.cursor.as_deref()).await?;
        Ok(serde_json::json!({ "resources": page.items, "nextCursor": page.next_cursor }))
    }
}

/// `resources/templates/list`.
pub struct ResourcesTemplatesListHandler(pub Arc<CapabilityRegistry>);

#[async_trait]
impl RequestHandler for ResourcesTemplatesListHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
        let templates = self.0.list_resource_templates().await;
        Ok(serde_json::json!({ "resourceTemplates": templates }))
    }
}

/// `resources/read`.
pub struct ResourcesReadHandler(pub Arc<CapabilityRegistry>);

#[async_trait]
impl RequestHandler for ResourcesReadHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, Error> {
        let read: ReadResourceParams = parse_params(params)?;
        let contents = self.0.read_resource(&read.uri, &ctx).await?;
        Ok(serde_json::json!({ "contents": contents }))
    }
}

/// `resources/subscribe`. The session id is threaded in at registration
/// time by whichever crate owns session lifetimes (`protomcp-server`).
pub struct ResourcesSubscribeHandler {
    pub registry: Arc<CapabilityRegistry>,
    pub session_id: u64,
}

#[async_trait]
impl RequestHandler for ResourcesSubscribeHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
        let read: ReadResourceParams = parse_params(params)?;
        self.registry.subscribe_resource(self.session_id, read.uri).await;
        Ok(Value::Object(Default::default()))
    }
}

/// `resources/unsubscribe`.
pub struct ResourcesUnsubscribeHandler {
    pub registry: Arc<CapabilityRegistry>,
    pub session_id: u64,
}

#[async_trait]
impl RequestHandler for ResourcesUnsubscribeHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
        let read: ReadResourceParams = parse_params(params)?;
        self.registry.unsubscribe_resource(self.session_id, &read.uri).await;
        Ok(Value::Object(Default::default()))
    }
}

/// `prompts/list`.
pub struct PromptsListHandler(pub Arc<CapabilityRegistry>);

#[async_trait]
impl RequestHandler for PromptsListHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
        let list: ListParams = parse_params(params)?;
        let page = self.0.list_prompts(list.cursor.as_deref()).await?;
        Ok(serde_json::json!({ "prompts": page.items, "nextCursor": page.next_cursor }))
    }
}

/// `prompts/get`.
pub struct PromptsGetHandler(pub Arc<CapabilityRegistry>);

#[async_trait]
impl RequestHandler for PromptsGetHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, Error> {
        let get: GetPromptParams = parse_params(params)?;
        let (description, messages) = self.0.get_prompt(&get.name, get.arguments, &ctx).await?;
        Ok(serde_json::json!({ "description": description, "messages": messages }))
    }
}

/// `ping`. Always succeeds with an empty object: a liveness check.
pub struct PingHandler;

#[async_trait]
impl RequestHandler for PingHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
        Ok(Value::Object(Default::default()))
    }
}

/// `logging/set_level`. Accepts any RFC-5424-style level name and stores
/// nothing beyond acknowledging it; the runtime's own log filtering is
/// controlled out-of-band via `RUST_LOG`/`tracing-subscriber`, so this
/// handler exists only to satisfy peers that require the method to exist.
pub struct LoggingSetLevelHandler;

#[async_trait]
impl RequestHandler for LoggingSetLevelHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
        let level = params
            .as_ref()
            .and_then(|p| p.get("level"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::new(ErrorKind::InvalidParams, "missing 'level'"))?;
        tracing::info!(%level, "peer requested log level change (acknowledged, not applied)");
        Ok(Value::Object(Default::default()))
    }
}

/// `completion/complete`. Returns an empty completion list; concrete
/// providers register their own handler to override this default.
pub struct CompletionCompleteHandler;

#[async_trait]
impl RequestHandler for CompletionCompleteHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
        Ok(serde_json::json!({
            "completion": { "values": [], "total": 0, "hasMore": false }
        }))
    }
}

/// Register the default `ping`, `logging/set_level`, and
/// `completion/complete` handlers on `dispatcher`, plus every method backed
/// by `registry`. Callers may overwrite any of these afterwards to
/// customize behavior.
pub fn register_default_handlers(
    dispatcher: &protomcp_session::Dispatcher,
    registry: Arc<CapabilityRegistry>,
) {
    dispatcher.register_handler("ping", Arc::new(PingHandler));
    dispatcher.register_handler("logging/set_level", Arc::new(LoggingSetLevelHandler));
    dispatcher.register_handler("completion/complete", Arc::new(CompletionCompleteHandler));
    dispatcher.register_handler("tools/list", Arc::new(ToolsListHandler(Arc::clone(&registry))));
    dispatcher.register_handler("tools/call", Arc::new(ToolsCallHandler(Arc::clone(&registry))));
    dispatcher.register_handler(
        "resources/list",
        Arc::new(ResourcesListHandler(Arc::clone(&registry))),
    );
    dispatcher.register_handler(
        "resources/templates/list",
        Arc::new(ResourcesTemplatesListHandler(Arc::clone(&registry))),
    );
    dispatcher.register_handler(
        "resources/read",
        Arc::new(ResourcesReadHandler(Arc::clone(&registry))),
    );
    dispatcher.register_handler("prompts/list", Arc::new(PromptsListHandler(Arc::clone(&registry))));
    dispatcher.register_handler("prompts/get", Arc::new(PromptsGetHandler(registry)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolHandler;
    use protomcp_protocol::types::{ToolDefinition, ToolResult};
    use protomcp_protocol::version::ProtocolVersion;
    use protomcp_session::{Cancellation, Dispatcher, PeerFacilities};
    use std::collections::HashMap;

    struct NoopPeer;
    #[async_trait]
    impl PeerFacilities for NoopPeer {
        async fn notify(&self, _method: &str, _params: Option<Value>) {}
        async fn call(&self, _method: &str, _params: Option<Value>) -> Result<Value, Error> {
            Ok(Value::Null)
        }
    }

    fn test_ctx(version: ProtocolVersion) -> RequestContext {
        RequestContext::new(None, Arc::new(NoopPeer), version, None, Cancellation::default())
    }

    struct Echo;
    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(
            &self,
            arguments: HashMap<String, Value>,
            _ctx: &RequestContext,
        ) -> Result<ToolResult, Error> {
            Ok(ToolResult {
                content: vec![],
                output: Some(Value::Object(arguments.into_iter().collect())),
                is_error: false,
            })
        }
    }

    #[tokio::test]
    async fn tools_call_uses_negotiated_version_for_result_shape() {
        let registry = Arc::new(CapabilityRegistry::new());
        registry
            .register_tool(
                ToolDefinition {
                    name: "echo".to_string(),
                    description: None,
                    input_schema: serde_json::json!({"type": "object"}),
                    annotations: None,
                },
                Arc::new(Echo),
            )
            .await;

        let handler = ToolsCallHandler(registry);
        let params = serde_json::json!({"name": "echo", "arguments": {"x": 1}});

        let legacy = handler
            .handle(Some(params.clone()), test_ctx(ProtocolVersion::V2024_11_05))
            .await
            .unwrap();
        assert!(legacy.get("content").is_some());
        assert!(legacy.get("output").is_none());

        let modern = handler
            .handle(Some(params), test_ctx(ProtocolVersion::V2025_03_26))
            .await
            .unwrap();
        assert_eq!(modern["output"], serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn default_handlers_answer_ping_and_completion() {
        let dispatcher = Dispatcher::default();
        register_default_handlers(&dispatcher, Arc::new(CapabilityRegistry::new()));

        let result = dispatcher
            .dispatch_request("ping", None, test_ctx(ProtocolVersion::PREFERRED))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({}));

        let result = dispatcher
            .dispatch_request("completion/complete", None, test_ctx(ProtocolVersion::PREFERRED))
            .await
            .unwrap();
        assert_eq!(result["completion"]["total"], serde_json::json!(0));
    }
}
