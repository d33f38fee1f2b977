use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use telos_core::AgentContext;

/// Where a tool implementation lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "server", rename_all = "snake_case")]
pub enum ToolOrigin {
    /// One of the fixed local tools.
    #[default]
    Builtin,
    /// Declared by the named remote tool server.
    Mcp(String),
}

impl fmt::Display for ToolOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOrigin::Builtin => f.write_str("builtin"),
            ToolOrigin::Mcp(server) => write!(f, "mcp:{server}"),
        }
    }
}

/// Describes a tool's interface for LLM consumption.
/// Maps to Claude's tool format and OpenAI's function format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name across every origin (e.g., "read_file")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// JSON Schema describing the expected input
    pub input_schema: Value,
    #[serde(default)]
    pub origin: ToolOrigin,
}

/// Represents an LLM requesting execution of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation ID for this invocation (used to match results)
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// JSON input arguments
    pub input: Value,
}

/// Result of executing a tool, sent back to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Must match the ToolCall id
    pub tool_call_id: String,
    /// Result content (text)
    pub content: String,
    /// Whether this result represents an error
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            tool_call_id: String::new(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            tool_call_id: String::new(),
            content: content.into(),
            is_error: true,
        }
    }

    pub fn for_call(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = id.into();
        self
    }
}

/// Context passed to tool execution: the two working roots and hard limits.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Root for file reads, writes and listings
    pub working_directory: PathBuf,
    /// Root for shell commands; `None` when the agent has no pack
    pub pack_directory: Option<PathBuf>,
    pub command_timeout: Duration,
    pub fetch_timeout: Duration,
    pub http: reqwest::Client,
}

impl ToolContext {
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            pack_directory: None,
            command_timeout: Self::DEFAULT_COMMAND_TIMEOUT,
            fetch_timeout: Self::DEFAULT_FETCH_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    /// Build a context from an agent's roots.
    pub fn from_agent(agent: &AgentContext) -> Self {
        let mut ctx = Self::new(agent.working_dir.clone());
        ctx.pack_directory = agent.pack_dir.clone();
        ctx
    }

    pub fn with_pack_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pack_directory = Some(dir.into());
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async. Failures are returned as
/// [`ToolError`] and turned into `is_error` results by the engine, so they
/// never abort a run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, JSON Schema, origin).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given JSON input.
    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Timeout after {}s{}", .after.as_secs(), captured_output(.stdout, .stderr))]
    Timeout {
        after: Duration,
        stdout: String,
        stderr: String,
    },
    #[error("Command exited with code {code}{}", captured_output(.stdout, .stderr))]
    NonZeroExit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("Not configured: {0}")]
    NotConfigured(String),
    #[error("Remote tool error: {0}")]
    Remote(String),
}

impl ToolError {
    /// Map an IO error on `path` to the matching tool failure.
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                ToolError::PermissionDenied(path.display().to_string())
            }
            _ => ToolError::Io(format!("{}: {err}", path.display())),
        }
    }
}

fn captured_output(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    if !stdout.is_empty() {
        out.push_str("\n--- stdout ---\n");
        out.push_str(stdout);
    }
    if !stderr.is_empty() {
        out.push_str("\n--- stderr ---\n");
        out.push_str(stderr);
    }
    out
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]({})", self.name, self.origin, self.description)
    }
}

/// Simple echo tool for testing purposes.
#[cfg(any(test, feature = "test-utils"))]
pub struct EchoTool;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            description: "Echoes back the input message. For testing.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The message to echo back"
                    }
                },
                "required": ["message"]
            }),
            origin: ToolOrigin::Builtin,
        }
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let message = input
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidInput("missing 'message' field".to_string()))?;

        Ok(ToolResult::success(message))
    }
}
