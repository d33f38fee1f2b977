pub mod conversation;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod stream;
pub mod tool;
pub mod tools;
pub mod trace;

pub use conversation::{ContentBlock, Conversation, ConversationMessage, Role};
pub use provider::{CompletionProvider, EventStream, LlmError};
pub use registry::{builtin_tools, RegistryError, ToolRegistry};
pub use runtime::{seed_message, ExecutionEngine, ExecutionFailure, ExecutionOutcome, TextSink};
pub use stream::{StopReason, StreamEvent};
pub use tool::{Tool, ToolCall, ToolContext, ToolDefinition, ToolError, ToolOrigin, ToolResult};
pub use tools::{FetchUrlTool, ListDirectoryTool, ReadFileTool, RunCommandTool, WriteFileTool};
pub use trace::{ExecutionTrace, RunStatus, TraceEvent};
