//! Server configuration document loading: a JSON document with a
//! top-level `mcpServers` map, each entry naming how to reach one provider.

use std::collections::HashMap;

use protomcp_protocol::error::{invalid_params, Error, ErrorKind};
use serde::Deserialize;

use crate::supervisor::LaunchSpec;

/// One `mcpServers` entry as it appears on disk.
#[derive(Debug, Clone, Deserialize)]
struct RawServerEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
}

/// The parsed document's top level.
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(rename = "mcpServers")]
    mcp_servers: HashMap<String, RawServerEntry>,
}

/// How to reach one configured provider, resolved from its `command`
/// sentinel: `@sse:<url>`, `@ws:<url>`, `@stdio:<command-line>`,
/// `@unix:<path>`, or an unprefixed command launched as a stdio subprocess.
#[derive(Debug, Clone)]
pub enum ServerEndpoint {
    /// Launch a local subprocess and speak stdio to it.
    Subprocess(LaunchSpec),
    /// Connect over SSE + HTTP POST to this URL.
    Sse(String),
    /// Connect over WebSocket to this URL.
    WebSocket(String),
    /// Connect to a Unix domain socket at this filesystem path.
    Unix(String),
}

/// A fully parsed server configuration document.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name to resolved endpoint, in declaration order.
    pub servers: Vec<(String, ServerEndpoint)>,
}

const SSE_PREFIX: &str = "@sse:";
const WS_PREFIX: &str = "@ws:";
const STDIO_PREFIX: &str = "@stdio:";
const UNIX_PREFIX: &str = "@unix:";

impl ServerConfig {
    /// Parse a server configuration document from its JSON bytes. Loading
    /// the bytes themselves (from a file, an embedded string, wherever) is
    /// the caller's responsibility; this only parses and resolves
    /// sentinels.
    pub fn parse(json: &str) -> Result<Self, Error> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|err| invalid_params(format!("malformed server config: {err}")))?;

        let mut servers = Vec::with_capacity(raw.mcp_servers.len());
        for (name, entry) in raw.mcp_servers {
            let endpoint = resolve_endpoint(&name, &entry)?;
            servers.push((name, endpoint));
        }
        servers.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self { servers })
    }
}

fn resolve_endpoint(name: &str, entry: &RawServerEntry) -> Result<ServerEndpoint, Error> {
    if let Some(url) = entry.command.strip_prefix(SSE_PREFIX) {
        return Ok(ServerEndpoint::Sse(url.to_string()));
    }
    if let Some(url) = entry.command.strip_prefix(WS_PREFIX) {
        return Ok(ServerEndpoint::WebSocket(url.to_string()));
    }
    if let Some(command_line) = entry.command.strip_prefix(STDIO_PREFIX) {
        return Ok(ServerEndpoint::Subprocess(launch_spec_from(
            command_line,
            &entry.args,
            &entry.env,
        )));
    }
    if let Some(path) = entry.command.strip_prefix(UNIX_PREFIX) {
        return Ok(ServerEndpoint::Unix(path.to_string()));
    }
    if entry.command.starts_with('@') {
        return Err(invalid_params(format!(
            "server '{name}': unknown command sentinel in '{}'",
            entry.command
        )));
    }
    Ok(ServerEndpoint::Subprocess(launch_spec_from(
        &entry.command,
        &entry.args,
        &entry.env,
    )))
}

fn launch_spec_from(command_line: &str, extra_args: &[String], env: &HashMap<String, String>) -> LaunchSpec {
    let mut parts = command_line.split_whitespace();
    let command = parts.next().unwrap_or_default().to_string();
    let mut args: Vec<String> = parts.map(str::to_string).collect();
    args.extend(extra_args.iter().cloned());
    LaunchSpec {
        command,
        args,
        env: env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_stdio_server() {
        let config = ServerConfig::parse(
            r#"{"mcpServers": {"fs": {"command": "mcp-fs", "args": ["--root", "/tmp"]}}}"#,
        )
        .unwrap();
        assert_eq!(config.servers.len(), 1);
        match &config.servers[0].1 {
            ServerEndpoint::Subprocess(spec) => {
                assert_eq!(spec.command, "mcp-fs");
                assert_eq!(spec.args, vec!["--root", "/tmp"]);
            }
            other => panic!("expected Subprocess, got {other:?}"),
        }
    }

    #[test]
    fn parses_sse_sentinel() {
        let config =
            ServerConfig::parse(r#"{"mcpServers": {"remote": {"command": "@sse:https://example.com/mcp"}}}"#)
                .unwrap();
        match &config.servers[0].1 {
            ServerEndpoint::Sse(url) => assert_eq!(url, "https://example.com/mcp"),
            other => panic!("expected Sse, got {other:?}"),
        }
    }

    #[test]
    fn parses_ws_sentinel() {
        let config =
            ServerConfig::parse(r#"{"mcpServers": {"remote": {"command": "@ws:ws://example.com/mcp"}}}"#)
                .unwrap();
        assert!(matches!(config.servers[0].1, ServerEndpoint::WebSocket(_)));
    }

    #[test]
    fn parses_unix_sentinel() {
        let config =
            ServerConfig::parse(r#"{"mcpServers": {"local": {"command": "@unix:/tmp/mcp.sock"}}}"#)
                .unwrap();
        match &config.servers[0].1 {
            ServerEndpoint::Unix(path) => assert_eq!(path, "/tmp/mcp.sock"),
            other => panic!("expected Unix, got {other:?}"),
        }
    }

    #[test]
    fn parses_stdio_sentinel_with_embedded_command_line() {
        let config =
            ServerConfig::parse(r#"{"mcpServers": {"local": {"command": "@stdio:mcp-fs --root /tmp"}}}"#)
                .unwrap();
        match &config.servers[0].1 {
            ServerEndpoint::Subprocess(spec) => {
                assert_eq!(spec.command, "mcp-fs");
                assert_eq!(spec.args, vec!["--root", "/tmp"]);
            }
            other => panic!("expected Subprocess, got {other:?}"),
        }
    }

    #[test]
    fn unknown_sentinel_is_a_config_error() {
        let err = ServerConfig::parse(r#"{"mcpServers": {"bad": {"command": "@grpc:host:1234"}}}"#)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParams);
    }
}
