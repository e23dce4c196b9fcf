//! Capability registry: tool/resource/prompt catalogs, URI template
//! dispatch, subscription tracking, and capability-gated notification
//! fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use protomcp_protocol::capabilities::{ListChangedCapability, ResourcesCapability, ServerCapabilities};
use protomcp_protocol::error::{Error, ErrorKind};
use protomcp_protocol::types::{
    PromptArgument, PromptDefinition, PromptMessage, ResourceDefinition,
    ResourceTemplateDefinition, ToolDefinition, ToolResult,
};
use protomcp_session::{PeerFacilities, RequestContext};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::uri_template::UriTemplate;

/// A registered tool's business logic.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool with its (already schema-shaped) arguments.
    async fn call(
        &self,
        arguments: HashMap<String, Value>,
        ctx: &RequestContext,
    ) -> Result<ToolResult, Error>;
}

/// A registered resource (or resource template)'s business logic.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Read the resource identified by `uri`. `params` carries any
    /// variables extracted from a matched URI template.
    async fn read(
        &self,
        uri: &str,
        params: &HashMap<String, String>,
        ctx: &RequestContext,
    ) -> Result<Vec<protomcp_protocol::content::ResourceContents>, Error>;
}

/// A registered prompt's business logic.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    /// Render the prompt given its argument values.
    async fn get(
        &self,
        arguments: HashMap<String, String>,
        ctx: &RequestContext,
    ) -> Result<(Option<String>, Vec<PromptMessage>), Error>;
}

struct ToolEntry {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

struct ResourceEntry {
    definition: ResourceDefinition,
    handler: Arc<dyn ResourceHandler>,
}

struct ResourceTemplateEntry {
    definition: ResourceTemplateDefinition,
    template: UriTemplate,
    handler: Arc<dyn ResourceHandler>,
}

struct PromptEntry {
    definition: PromptDefinition,
    handler: Arc<dyn PromptHandler>,
}

/// Opaque identifier for a registered peer session, used to key
/// subscriptions and the fan-out table.
pub type SessionId = u64;

struct RegisteredSession {
    peer: Arc<dyn PeerFacilities>,
    capabilities: ServerCapabilities,
}

/// A page of `*/list` results, cursor-paginated.
pub struct Page<T> {
    /// Items in this page.
    pub items: Vec<T>,
    /// Opaque cursor for the next page, `None` once exhausted.
    pub next_cursor: Option<String>,
}

const DEFAULT_PAGE_SIZE: usize = 50;

/// The provider-side catalog of tools, resources, and prompts, plus the
/// subscription/fan-out bookkeeping needed for
/// `notifications/resources/updated` and the `*_list_changed` family.
#[derive(Default)]
pub struct CapabilityRegistry {
    tools: RwLock<HashMap<String, ToolEntry>>,
    resources: RwLock<HashMap<String, ResourceEntry>>,
    resource_templates: RwLock<Vec<ResourceTemplateEntry>>,
    prompts: RwLock<HashMap<String, PromptEntry>>,
    subscriptions: RwLock<HashMap<String, HashSet<SessionId>>>,
    sessions: RwLock<HashMap<SessionId, RegisteredSession>>,
}

impl CapabilityRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- registration -----------------------------------------------

    /// Register (or replace) a tool.
    pub async fn register_tool(&self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        let name = definition.name.clone();
        self.tools
            .write()
            .await
            .insert(name, ToolEntry { definition, handler });
        self.notify_list_changed("tools", |caps| {
            caps.tools.as_ref().is_some_and(|t| t.list_changed)
        })
        .await;
    }

    /// Register (or replace) a concrete, non-templated resource.
    pub async fn register_resource(
        &self,
        definition: ResourceDefinition,
        handler: Arc<dyn ResourceHandler>,
    ) {
        let uri = definition.uri.clone();
        self.resources
            .write()
            .await
            .insert(uri, ResourceEntry { definition, handler });
        self.notify_list_changed("resources", |caps| {
            caps.resources.as_ref().is_some_and(|r| r.list_changed)
        })
        .await;
    }

    /// Register a URI-templated resource family.
    pub async fn register_resource_template(
        &self,
        definition: ResourceTemplateDefinition,
        handler: Arc<dyn ResourceHandler>,
    ) -> Result<(), Error> {
        let template = UriTemplate::parse(&definition.uri_template).map_err(|err| {
            Error::new(
                ErrorKind::InvalidParams,
                format!("invalid resource template '{}': {err}", definition.uri_template),
            )
        })?;
        self.resource_templates.write().await.push(ResourceTemplateEntry {
            definition,
            template,
            handler,
        });
        self.notify_list_changed("resources", |caps| {
            caps.resources.as_ref().is_some_and(|r| r.list_changed)
        })
        .await;
        Ok(())
    }

    /// Register (or replace) a prompt.
    pub async fn register_prompt(
        &self,
        definition: PromptDefinition,
        handler: Arc<dyn PromptHandler>,
    ) {
        let name = definition.name.clone();
        self.prompts
            .write()
            .await
            .insert(name, PromptEntry { definition, handler });
        self.notify_list_changed("prompts", |caps| {
            caps.prompts.as_ref().is_some_and(|p| p.list_changed)
        })
        .await;
    }

    /// Remove a tool. No-op if it was never registered.
    pub async fn unregister_tool(&self, name: &str) {
        let removed = self.tools.write().await.remove(name).is_some();
        if removed {
            self.notify_list_changed("tools", |caps| {
                caps.tools.as_ref().is_some_and(|t| t.list_changed)
            })
            .await;
        }
    }

    /// Remove a concrete resource. No-op if it was never registered.
    pub async fn unregister_resource(&self, uri: &str) {
        let removed = self.resources.write().await.remove(uri).is_some();
        if removed {
            self.notify_list_changed("resources", |caps| {
                caps.resources.as_ref().is_some_and(|r| r.list_changed)
            })
            .await;
        }
    }

    /// Remove a resource template by its template string. No-op if no
    /// template with that exact `uriTemplate` was registered.
    pub async fn unregister_resource_template(&self, uri_template: &str) {
        let removed = {
            let mut templates = self.resource_templates.write().await;
            let before = templates.len();
            templates.retain(|entry| entry.definition.uri_template != uri_template);
            templates.len() != before
        };
        if removed {
            self.notify_list_changed("resources", |caps| {
                caps.resources.as_ref().is_some_and(|r| r.list_changed)
            })
            .await;
        }
    }

    /// Remove a prompt. No-op if it was never registered.
    pub async fn unregister_prompt(&self, name: &str) {
        let removed = self.prompts.write().await.remove(name).is_some();
        if removed {
            self.notify_list_changed("prompts", |caps| {
                caps.prompts.as_ref().is_some_and(|p| p.list_changed)
            })
            .await;
        }
    }

    // ---- session fan-out table ---------------------------------------

    /// Register a connected peer session for capability-gated fan-out.
    pub async fn register_session(
        &self,
        id: SessionId,
        peer: Arc<dyn PeerFacilities>,
        capabilities: ServerCapabilities,
    ) {
        self.sessions
            .write()
            .await
            .insert(id, RegisteredSession { peer, capabilities });
    }

    /// The capabilities this registry currently supports, derived from
    /// what has actually been registered. `list_changed: true` on every
    /// advertised family since registration always fans out;
    /// `resources.subscribe` is advertised whenever any resource exists,
    /// since subscriptions apply to both concrete resources and templates.
    pub async fn capabilities(&self) -> ServerCapabilities {
        let has_tools = !self.tools.read().await.is_empty();
        let has_resources =
            !self.resources.read().await.is_empty() || !self.resource_templates.read().await.is_empty();
        let has_prompts = !self.prompts.read().await.is_empty();

        ServerCapabilities {
            tools: has_tools.then(|| ListChangedCapability { list_changed: true }),
            resources: has_resources.then(|| ResourcesCapability {
                list_changed: true,
                subscribe: true,
            }),
            prompts: has_prompts.then(|| ListChangedCapability { list_changed: true }),
            logging: Some(serde_json::json!({})),
            completions: Some(serde_json::json!({})),
        }
    }

    /// Drop a closed session from the fan-out table and every subscription.
    pub async fn unregister_session(&self, id: SessionId) {
        self.sessions.write().await.remove(&id);
        let mut subs = self.subscriptions.write().await;
        for subscribers in subs.values_mut() {
            subscribers.remove(&id);
        }
        subs.retain(|_, subscribers| !subscribers.is_empty());
    }

    async fn notify_list_changed(
        &self,
        family: &str,
        advertises: impl Fn(&ServerCapabilities) -> bool,
    ) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            if advertises(&session.capabilities) {
                session
                    .peer
                    .notify(&format!("notifications/{family}/list_changed"), None)
                    .await;
            }
        }
    }

    // ---- subscriptions -------------------------------------------------

    /// Subscribe `session` to update notifications for `uri`.
    pub async fn subscribe_resource(&self, session: SessionId, uri: String) {
        self.subscriptions.write().await.entry(uri).or_default().insert(session);
    }

    /// Unsubscribe `session` from `uri`.
    pub async fn unsubscribe_resource(&self, session: SessionId, uri: &str) {
        if let Some(subscribers) = self.subscriptions.write().await.get_mut(uri) {
            subscribers.remove(&session);
        }
    }

    /// Notify every subscriber of `uri` that it changed.
    /// Gated the same way `*_list_changed` is: only sessions that advertised
    /// `resources.subscribe` are ever registered as subscribers in the first
    /// place, so no additional capability check is needed here.
    pub async fn notify_resource_updated(&self, uri: &str) {
        let subscribers = {
            let subs = self.subscriptions.read().await;
            match subs.get(uri) {
                Some(set) => set.clone(),
                None => return,
            }
        };
        let sessions = self.sessions.read().await;
        for id in subscribers {
            if let Some(session) = sessions.get(&id) {
                session
                    .peer
                    .notify(
                        "notifications/resources/updated",
                        Some(serde_json::json!({ "uri": uri })),
                    )
                    .await;
            }
        }
    }

    // ---- listing --------------------------------------------------------

    /// List registered tools, paginated.
    pub async fn list_tools(&self, cursor: Option<&str>) -> Result<Page<ToolDefinition>, Error> {
        let tools = self.tools.read().await;
        let mut names: Vec<&String> = tools.keys().collect();
        names.sort();
        paginate(&names, cursor, |name| tools[name].definition.clone())
    }

    /// List registered concrete resources, paginated.
    pub async fn list_resources(
        &self,
        cursor: Option<&str>,
    ) -> Result<Page<ResourceDefinition>, Error> {
        let resources = self.resources.read().await;
        let mut uris: Vec<&String> = resources.keys().collect();
        uris.sort();
        paginate(&uris, cursor, |uri| resources[uri].definition.clone())
    }

    /// List registered resource templates.
    pub async fn list_resource_templates(&self) -> Vec<ResourceTemplateDefinition> {
        self.resource_templates
            .read()
            .await
            .iter()
            .map(|e| e.definition.clone())
            .collect()
    }

    /// List registered prompts, paginated.
    pub async fn list_prompts(
        &self,
        cursor: Option<&str>,
    ) -> Result<Page<PromptDefinition>, Error> {
        let prompts = self.prompts.read().await;
        let mut names: Vec<&String> = prompts.keys().collect();
        names.sort();
        paginate(&names, cursor, |name| prompts[name].definition.clone())
    }

    // ---- invocation -------------------------------------------------------

    /// Call a tool by name.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: HashMap<String, Value>,
        ctx: &RequestContext,
    ) -> Result<ToolResult, Error> {
        let handler = {
            let tools = self.tools.read().await;
            tools
                .get(name)
                .map(|entry| Arc::clone(&entry.handler))
                .ok_or_else(|| Error::new(ErrorKind::ToolNotFound, format!("unknown tool '{name}'")))?
        };
        handler.call(arguments, ctx).await
    }

    /// Read a resource, matching concrete registrations before templates,
    /// and preferring the most specific matching template.
    pub async fn read_resource(
        &self,
        uri: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<protomcp_protocol::content::ResourceContents>, Error> {
        if let Some(entry) = self.resources.read().await.get(uri) {
            return entry.handler.read(uri, &HashMap::new(), ctx).await;
        }

        let templates = self.resource_templates.read().await;
        let best = templates
            .iter()
            .filter_map(|entry| entry.template.matches(uri).map(|params| (entry, params)))
            .max_by_key(|(entry, _)| entry.template.specificity());

        match best {
            Some((entry, params)) => entry.handler.read(uri, &params, ctx).await,
            None => Err(Error::new(
                ErrorKind::ResourceNotFound,
                format!("no resource or template matches '{uri}'"),
            )),
        }
    }

    /// Get a rendered prompt by name.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
        ctx: &RequestContext,
    ) -> Result<(Option<String>, Vec<PromptMessage>), Error> {
        let handler = {
            let prompts = self.prompts.read().await;
            let entry = prompts.get(name).ok_or_else(|| {
                Error::new(ErrorKind::ResourceNotFound, format!("unknown prompt '{name}'"))
            })?;
            validate_required_arguments(&entry.definition.arguments, &arguments)?;
            Arc::clone(&entry.handler)
        };
        handler.get(arguments, ctx).await
    }
}

fn validate_required_arguments(
    defined: &[PromptArgument],
    supplied: &HashMap<String, String>,
) -> Result<(), Error> {
    for arg in defined {
        if arg.required && !supplied.contains_key(&arg.name) {
            return Err(Error::new(
                ErrorKind::InvalidParams,
                format!("missing required argument '{}'", arg.name),
            ));
        }
    }
    Ok(())
}

fn paginate<T>(
    keys: &[&String],
    cursor: Option<&str>,
    render: impl Fn(&String) -> T,
) -> Result<Page<T>, Error> {
    let start = match cursor {
        None => 0,
        Some(cursor) => {
            let idx: usize = cursor.parse().map_err(|_| {
                Error::new(ErrorKind::InvalidParams, "malformed pagination cursor")
            })?;
            if idx > keys.len() {
                warn!(cursor, "pagination cursor past end of collection");
            }
            idx
        }
    };
    let end = (start + DEFAULT_PAGE_SIZE).min(keys.len());
    let items = keys[start.min(keys.len())..end].iter().map(|k| render(*k)).collect();
    let next_cursor = if end < keys.len() { Some(end.to_string()) } else { None };
    Ok(Page { items, next_cursor })
}
