use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A named task descriptor: routing id, one-line description, prompt body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub description: String,
    pub prompt_body: String,
}

impl Skill {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        prompt_body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            prompt_body: prompt_body.into(),
        }
    }
}

/// Wire transport used to reach a remote tool server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum McpTransportKind {
    /// Legacy server-sent-events transport (`GET` stream + `POST` endpoint).
    #[serde(rename = "sse")]
    LegacySse,
    /// Streamable HTTP: every message is a `POST`, replies come back as JSON
    /// or as a short SSE body.
    #[default]
    #[serde(rename = "streamable-http", alias = "http")]
    StreamableHttp,
}

/// One remote tool server as declared in an agent's `mcp.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Server name (the key in `mcpServers`).
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub transport: McpTransportKind,
    /// Header values may contain `${ENV_VAR}` placeholders, resolved at connect time.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Immutable per-run execution roots and remote servers.
///
/// File tools are rooted at `working_dir`; shell commands run in `pack_dir`.
/// The two are never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentContext {
    pub working_dir: PathBuf,
    pub pack_dir: Option<PathBuf>,
    pub mcp_servers: Vec<McpServerConfig>,
}

impl AgentContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            pack_dir: None,
            mcp_servers: Vec::new(),
        }
    }

    pub fn with_pack_dir(mut self, pack_dir: impl Into<PathBuf>) -> Self {
        self.pack_dir = Some(pack_dir.into());
        self
    }

    pub fn with_mcp_servers(mut self, servers: Vec<McpServerConfig>) -> Self {
        self.mcp_servers = servers;
        self
    }
}
