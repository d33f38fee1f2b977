//! File reading tool, rooted at the working directory.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::paths::resolve_within;
use super::required_str;
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolOrigin, ToolResult};

/// Read a UTF-8 text file relative to the working directory.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description: "Read the contents of a file. Path is relative to the working directory."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Relative file path to read"
                    }
                },
                "required": ["path"]
            }),
            origin: ToolOrigin::Builtin,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let requested = required_str(&input, "path")?;
        let path = resolve_within(&context.working_directory, requested)?;

        debug!(path = %path.display(), "reading file");

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ToolError::from_io(e, &path))?;
        let content = String::from_utf8(bytes).map_err(|_| {
            ToolError::InvalidInput(format!("'{requested}' is not a UTF-8 text file"))
        })?;

        Ok(ToolResult::success(content))
    }
}
