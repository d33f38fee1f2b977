//! File writing tool with parent directory creation.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::paths::resolve_within;
use super::required_str;
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolOrigin, ToolResult};

/// Write or overwrite a file under the working directory.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".to_string(),
            description: "Write content to a file. Path is relative to the working directory. \
                          Parent directories are created if needed."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Relative file path to write"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content to write to the file"
                    }
                },
                "required": ["path", "content"]
            }),
            origin: ToolOrigin::Builtin,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let requested = required_str(&input, "path")?;
        let content = required_str(&input, "content")?;

        let path = resolve_within(&context.working_directory, requested)?;

        debug!(path = %path.display(), bytes = content.len(), "writing file");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::from_io(e, parent))?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::from_io(e, &path))?;

        Ok(ToolResult::success(format!(
            "Wrote {} bytes to {requested}",
            content.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = WriteFileTool
            .execute(
                serde_json::json!({"path": "output.txt", "content": "hello world"}),
                &ctx,
            )
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(result.content, "Wrote 11 bytes to output.txt");

        let written = tokio::fs::read_to_string(dir.path().join("output.txt"))
            .await
            .unwrap();
        assert_eq!(written, "hello world");
    }

    #[tokio::test]
    async fn test_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        WriteFileTool
            .execute(
                serde_json::json!({"path": "sub/dir/test.md", "content": "nested"}),
                &ctx,
            )
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("sub/dir/test.md")).unwrap();
        assert_eq!(written, "nested");
    }

    #[tokio::test]
    async fn test_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "old").unwrap();
        let ctx = ToolContext::new(dir.path());

        WriteFileTool
            .execute(serde_json::json!({"path": "a.md", "content": "new"}), &ctx)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("a.md")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_escape_rejected_and_nothing_written() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("vault");
        std::fs::create_dir(&root).unwrap();
        let ctx = ToolContext::new(&root);

        let err = WriteFileTool
            .execute(
                serde_json::json!({"path": "../escaped.txt", "content": "x"}),
                &ctx,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::PermissionDenied(_)));
        assert!(!parent.path().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_content_field() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        let err = WriteFileTool
            .execute(serde_json::json!({"path": "a.txt"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
