//! Capability definition types and request/result shapes for the core
//! methods of the runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capabilities::{ClientCapabilities, Implementation, ServerCapabilities};
use crate::content::Content;
use crate::version::ProtocolVersion;

/// `_meta` envelope carried on requests that support progress reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    /// Opaque token the peer echoes back on `$/progress` notifications.
    #[serde(skip_serializing_if = "Option::is_none", rename = "progressToken")]
    pub progress_token: Option<serde_json::Value>,
}

/// `initialize` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    /// The version the client prefers to speak.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// The client's advertised capabilities.
    pub capabilities: ClientCapabilities,
    /// Identifies the connecting client implementation.
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
    /// Optional tracing hint, ignored by this runtime beyond passthrough.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// Optional workspace roots advertised at handshake time.
    #[serde(skip_serializing_if = "Option::is_none", rename = "workspaceFolders")]
    pub workspace_folders: Option<Vec<String>>,
}

/// `initialize` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// The version the server will speak for the rest of the session.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// The server's advertised capabilities.
    pub capabilities: ServerCapabilities,
    /// Identifies the serving implementation.
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    /// Free-form usage instructions surfaced to the host/user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// A registered tool definition, as stored in a capability registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Stable tool name, used as the registry key.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema object describing accepted arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
    /// Optional behavior hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

/// Behavior hints for a tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAnnotations {
    /// Human-facing title, distinct from the stable `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The tool only reads state.
    #[serde(default, rename = "readOnlyHint")]
    pub read_only_hint: bool,
    /// The tool may perform destructive operations.
    #[serde(default, rename = "destructiveHint")]
    pub destructive_hint: bool,
    /// Calling repeatedly with the same args has no additional effect.
    #[serde(default, rename = "idempotentHint")]
    pub idempotent_hint: bool,
    /// The tool may interact with entities outside this server's world.
    #[serde(default, rename = "openWorldHint")]
    pub open_world_hint: bool,
}

/// A tool call result, new-version shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResult {
    /// Content elements describing the outcome (always present so older
    /// peers, or callers not asking for `output`, still get something to
    /// render).
    pub content: Vec<Content>,
    /// Structured output, new-version shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Whether the tool itself reports a business-level error (distinct
    /// from an RPC-level failure).
    #[serde(default, rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    /// A plain success result with a single text content element.
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(s)],
            output: None,
            is_error: false,
        }
    }

    /// A business-level error result (still an RPC success).
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(message)],
            output: None,
            is_error: true,
        }
    }

    /// Re-encode this result for the given negotiated protocol version.
    pub fn for_version(self, version: ProtocolVersion) -> serde_json::Value {
        if version.uses_legacy_tool_result() {
            serde_json::json!({ "content": self.content, "isError": self.is_error })
        } else if let Some(output) = self.output {
            serde_json::json!({ "output": output })
        } else {
            // Handler produced content[] but peer speaks the new version:
            // content[] is already a first-class new-version field, so
            // pass it through unchanged.
            serde_json::json!({ "content": self.content, "isError": self.is_error })
        }
    }
}

/// A registered resource definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// The resource's URI.
    pub uri: String,
    /// Human-readable name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type, if known statically.
    #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
    pub mime_type: Option<String>,
    /// Opaque version, bumped on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Size in bytes, if known without reading the content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A URI template bound to a parameterized resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplateDefinition {
    /// RFC-6570-style template, e.g. `file:///{path*}`.
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    /// Human-readable name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type, if uniform across expansions.
    #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
    pub mime_type: Option<String>,
}

/// A registered prompt definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Stable identifier. Newer peers address prompts by `uri`; the legacy
    /// version addresses them by `name` — both are populated and a caller
    /// may look up by either.
    pub name: String,
    /// Optional URI form of the identifier (new version).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Human-facing title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Accepted arguments.
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

/// One accepted argument of a [`PromptDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Default value, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// The message role of a [`PromptMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Authored by the end user.
    User,
    /// Authored by the model.
    Assistant,
}

/// One message produced by `prompts/get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Who authored the message.
    pub role: Role,
    /// Ordered content parts.
    pub content: Vec<Content>,
}

/// The new-version nested shape for a `tools/call` request, carried under
/// the `tool_call` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name to invoke.
    pub name: String,
    /// Arguments, matched against the tool's input schema.
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
}

/// `tools/call` request params. A legacy peer sends the flat `name` +
/// `arguments` pair; a new-version peer may additionally or instead send
/// a nested `tool_call` object. When both are present, the negotiated
/// protocol version selects which one is authoritative — fields outside
/// that version are ignored. See [`CallToolParams::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Legacy flat tool name.
    #[serde(default)]
    pub name: Option<String>,
    /// Legacy flat arguments.
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
    /// New-version nested call shape.
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    /// Progress/cancellation metadata.
    #[serde(default, rename = "_meta")]
    pub meta: Meta,
}

impl CallToolParams {
    /// Resolve the name/arguments pair to actually invoke, given the
    /// session's negotiated protocol version: a legacy peer's flat fields
    /// win even if a `tool_call` object is also present, and a new-version
    /// peer's `tool_call` wins over its flat fields when both are sent.
    pub fn resolve(self, version: ProtocolVersion) -> (String, HashMap<String, serde_json::Value>) {
        if !version.uses_legacy_tool_result() {
            if let Some(call) = self.tool_call {
                return (call.name, call.arguments);
            }
        }
        (self.name.unwrap_or_default(), self.arguments)
    }
}

/// `resources/read` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    /// URI to read, possibly matching a registered template.
    pub uri: String,
}

/// `prompts/get` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptParams {
    /// Prompt name or URI.
    pub name: String,
    /// Argument values.
    #[serde(default)]
    pub arguments: HashMap<String, String>,
}

/// Pagination cursor used by `*/list` operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    /// Opaque cursor from a previous page's `next_cursor`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}
