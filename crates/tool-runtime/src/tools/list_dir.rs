//! Directory listing tool.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::paths::resolve_within;
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolOrigin, ToolResult};

/// List one directory level, sorted by name; subdirectories end with `/`.
pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_directory".to_string(),
            description: "List files and directories at a path relative to the working directory."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Relative directory path (default: '.')"
                    }
                }
            }),
            origin: ToolOrigin::Builtin,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let requested = input.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let path = resolve_within(&context.working_directory, requested)?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ToolError::from_io(e, &path))?;
        if !metadata.is_dir() {
            return Err(ToolError::NotADirectory(requested.to_string()));
        }

        let mut reader = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| ToolError::from_io(e, &path))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::from_io(e, &path))?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        debug!(path = %path.display(), count = entries.len(), "listed directory");

        if entries.is_empty() {
            return Ok(ToolResult::success("(empty directory)"));
        }
        Ok(ToolResult::success(entries.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_sorted_with_dir_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("notes")).unwrap();

        let ctx = ToolContext::new(dir.path());
        let result = ListDirectoryTool
            .execute(serde_json::json!({"path": "."}), &ctx)
            .await
            .unwrap();

        assert_eq!(result.content, "a.txt\nb.txt\nnotes/");
    }

    #[tokio::test]
    async fn test_default_path_is_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("only.md"), "").unwrap();
        let ctx = ToolContext::new(dir.path());
        let result = ListDirectoryTool
            .execute(serde_json::json!({}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.content, "only.md");
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        let result = ListDirectoryTool
            .execute(serde_json::json!({"path": "."}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.content, "(empty directory)");
    }

    #[tokio::test]
    async fn test_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        let ctx = ToolContext::new(dir.path());
        let err = ListDirectoryTool
            .execute(serde_json::json!({"path": "a.txt"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        let err = ListDirectoryTool
            .execute(serde_json::json!({"path": "nope"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
