//! Built-in tool implementations.
//!
//! File tools (`write_file`, `read_file`, `list_directory`) are rooted at the
//! working directory. `run_command` runs in the pack directory. `fetch_url`
//! is rootless.

pub mod fetch;
pub mod file_read;
pub mod file_write;
pub mod list_dir;
pub mod paths;
pub mod run_command;

pub use fetch::FetchUrlTool;
pub use file_read::ReadFileTool;
pub use file_write::WriteFileTool;
pub use list_dir::ListDirectoryTool;
pub use run_command::RunCommandTool;

use crate::tool::ToolError;

fn required_str<'a>(input: &'a serde_json::Value, field: &str) -> Result<&'a str, ToolError> {
    input
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidInput(format!("missing '{field}' field")))
}
