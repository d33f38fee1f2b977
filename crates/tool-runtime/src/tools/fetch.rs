//! HTTP fetch tool.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::required_str;
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolOrigin, ToolResult};

/// Fetch a URL and return its body as text.
pub struct FetchUrlTool;

impl FetchUrlTool {
    pub const MAX_CHARS: usize = 100_000;
    const TRUNCATION_MARKER: &'static str = "\n\n[truncated]";

    fn truncate(body: String) -> String {
        match body.char_indices().nth(Self::MAX_CHARS) {
            Some((cut, _)) => {
                let mut out = body[..cut].to_string();
                out.push_str(Self::TRUNCATION_MARKER);
                out
            }
            None => body,
        }
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "fetch_url".to_string(),
            description: "Fetch the content of a URL via HTTP GET.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The URL to fetch"
                    }
                },
                "required": ["url"]
            }),
            origin: ToolOrigin::Builtin,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let url = required_str(&input, "url")?;

        debug!(url, timeout_secs = context.fetch_timeout.as_secs(), "fetching url");

        let response = context
            .http
            .get(url)
            .timeout(context.fetch_timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, context))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "fetch returned non-success status");
            return Err(ToolError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, context))?;

        Ok(ToolResult::success(Self::truncate(body)))
    }
}

fn map_reqwest_error(err: reqwest::Error, context: &ToolContext) -> ToolError {
    if err.is_timeout() {
        ToolError::Timeout {
            after: context.fetch_timeout,
            stdout: String::new(),
            stderr: String::new(),
        }
    } else if err.is_builder() {
        ToolError::InvalidInput(err.to_string())
    } else {
        ToolError::Network(err.to_string())
    }
}
