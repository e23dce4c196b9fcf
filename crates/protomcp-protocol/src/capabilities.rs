//! Capability negotiation types exchanged during `initialize`.

use serde::{Deserialize, Serialize};

/// Name/version pair identifying a peer implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name.
    pub name: String,
    /// Implementation version string.
    pub version: String,
}

/// Capabilities a client advertises in `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Supports `roots/list` and `notifications/roots/list_changed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    /// Supports `sampling/createMessage`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<serde_json::Value>,
}

/// The `roots` sub-capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootsCapability {
    /// Whether the client emits `notifications/roots/list_changed`.
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

/// Capabilities a server advertises in its `initialize` response.
///
/// Each `Option<Capability>` that is `Some` both tells the peer the feature
/// is present and is what the capability registry consults before fanning
/// out the matching `*_list_changed` notification — a session that never
/// advertised `tools` never receives `notifications/tools/list_changed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool listing/calling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapability>,
    /// Resource listing/reading/subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Prompt listing/fetching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapability>,
    /// Structured log-level control and `notifications/message`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
    /// `completion/complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<serde_json::Value>,
}

/// A capability family that can notify `list_changed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListChangedCapability {
    /// Whether the server emits the family's `list_changed` notification.
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

/// The `resources` capability, which additionally may support subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesCapability {
    /// Whether the server emits `notifications/resources/list_changed`.
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
    /// Whether `resources/subscribe` and `resources/unsubscribe` work.
    #[serde(default)]
    pub subscribe: bool,
}
