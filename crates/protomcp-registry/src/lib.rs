//! Tool/resource/prompt capability registry, URI template matching, and
//! capability-gated notification fan-out.

pub mod handlers;
pub mod registry;
pub mod uri_template;

#[cfg(test)]
mod testing;

pub use handlers::{
    register_default_handlers, CompletionCompleteHandler, LoggingSetLevelHandler, PingHandler,
    PromptsGetHandler, PromptsListHandler, ResourcesListHandler, ResourcesReadHandler,
    ResourcesSubscribeHandler, ResourcesTemplatesListHandler, ResourcesUnsubscribeHandler,
    ToolsCallHandler, ToolsListHandler,
};
pub use registry::{CapabilityRegistry, Page, PromptHandler, ResourceHandler, SessionId, ToolHandler};
pub use uri_template::{UriTemplate, UriTemplateError};
