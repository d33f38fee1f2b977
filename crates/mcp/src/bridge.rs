//! One execution's worth of remote tool sessions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use telos_core::{EnvMap, McpServerConfig, McpTransportKind};
use telos_tool_runtime::{Tool, ToolDefinition, ToolResult};

use crate::client::{McpSession, McpTool, DEFAULT_REQUEST_TIMEOUT};
use crate::error::McpError;
use crate::transport::{McpTransport, SseTransport, StreamableHttpTransport};

/// Sessions to every configured server for a single skill execution.
///
/// Callers own the lifetime: [`McpBridge::close`] must run on every exit
/// path. Dropping without closing still aborts background readers but skips
/// the polite session teardown.
pub struct McpBridge {
    sessions: Vec<Arc<McpSession>>,
}

impl McpBridge {
    /// A bridge with no servers.
    pub fn empty() -> Self {
        Self {
            sessions: Vec::new(),
        }
    }

    pub fn from_sessions(sessions: Vec<McpSession>) -> Self {
        Self {
            sessions: sessions.into_iter().map(Arc::new).collect(),
        }
    }

    /// Connect to every server in order. If any server fails, the sessions
    /// opened so far are closed before the error is returned.
    pub async fn connect(servers: &[McpServerConfig], env: &EnvMap) -> Result<Self, McpError> {
        Self::connect_with_timeout(servers, env, DEFAULT_REQUEST_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        servers: &[McpServerConfig],
        env: &EnvMap,
        request_timeout: Duration,
    ) -> Result<Self, McpError> {
        let mut bridge = Self::empty();
        for server in servers {
            match connect_server(server, env, request_timeout).await {
                Ok(session) => {
                    info!(
                        server = %server.name,
                        transport = ?server.transport,
                        tools = session.tools().len(),
                        "connected to MCP server"
                    );
                    bridge.sessions.push(Arc::new(session));
                }
                Err(e) => {
                    warn!(server = %server.name, error = %e, "MCP connect failed");
                    bridge.close().await;
                    return Err(e);
                }
            }
        }
        Ok(bridge)
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> &[Arc<McpSession>] {
        &self.sessions
    }

    /// Every remote tool, in server then listing order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.sessions
            .iter()
            .flat_map(|s| s.tool_definitions())
            .collect()
    }

    /// `Tool` adapters for registration next to the built-ins.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.sessions
            .iter()
            .flat_map(|session| {
                session.tools().iter().map(move |info| {
                    Arc::new(McpTool::new(info.clone(), Arc::clone(session))) as Arc<dyn Tool>
                })
            })
            .collect()
    }

    /// Dispatch by tool name. Connection and remote failures come back as
    /// `is_error` results, never as errors.
    ///
    /// The engine goes through the registry and [`McpBridge::tools`]; this is
    /// for callers that hold the bridge directly and have no registry.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult {
        let Some(session) = self
            .sessions
            .iter()
            .find(|s| s.tools().iter().any(|t| t.name == name))
        else {
            return ToolResult::error(format!("Unknown tool: {name}"));
        };

        match session.call_tool(name, arguments).await {
            Ok(result) => result.into(),
            Err(e) => {
                warn!(server = %session.server(), tool = %name, error = %e, "MCP tool call failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    /// Close every session.
    pub async fn close(self) {
        for session in &self.sessions {
            session.close().await;
        }
    }
}

/// Resolve `${VAR}` placeholders in every header value.
pub fn resolve_headers(
    server: &McpServerConfig,
    env: &EnvMap,
) -> Result<BTreeMap<String, String>, McpError> {
    server
        .headers
        .iter()
        .map(|(name, value)| {
            telos_core::env::interpolate(value, env)
                .map(|resolved| (name.clone(), resolved))
                .map_err(|e| McpError::MissingCredential {
                    server: server.name.clone(),
                    detail: format!("header '{name}': {e}"),
                })
        })
        .collect()
}

async fn connect_server(
    server: &McpServerConfig,
    env: &EnvMap,
    request_timeout: Duration,
) -> Result<McpSession, McpError> {
    let headers = resolve_headers(server, env)?;
    let transport: Box<dyn McpTransport> = match server.transport {
        McpTransportKind::StreamableHttp => {
            Box::new(StreamableHttpTransport::new(&server.url, &headers)?)
        }
        McpTransportKind::LegacySse => {
            Box::new(SseTransport::connect(&server.url, &headers, request_timeout).await?)
        }
    };
    McpSession::start(&server.name, transport, request_timeout).await
}
