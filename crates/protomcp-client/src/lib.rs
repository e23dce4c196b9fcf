//! Host-side runtime: subprocess supervision, server configuration
//! loading, and a multi-session registry.

pub mod config;
pub mod registry;
pub mod supervisor;

pub use config::{ServerConfig, ServerEndpoint};
pub use registry::{ConnectionError, ManagedSession, SessionRegistry};
pub use supervisor::{ChildTransport, ExitReport, LaunchSpec, Supervisor, TerminationConfig};
