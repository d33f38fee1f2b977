//! [`CompletionProvider`] implementation for the Anthropic streaming API.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use telos_tool_runtime::{
    CompletionProvider, ConversationMessage, EventStream, LlmError, ToolDefinition,
};

use super::sse::BlockTracker;
use super::translate::{message_to_anthropic, tool_definition_to_anthropic};
use crate::providers::sse::{check_status, decode_response};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic provider with streaming tool-use support.
///
/// Uses the Messages API (`/v1/messages`) with `stream: true`; tool calls are
/// emitted once their input JSON is complete.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `model` - Model name (e.g. `"claude-sonnet-4-6"`)
    /// * `base_url` - API base URL (e.g. `"https://api.anthropic.com"`)
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(super) fn request_body(
        &self,
        system_prompt: &str,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
        max_tokens: u32,
    ) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(message_to_anthropic).collect::<Vec<_>>(),
            "max_tokens": max_tokens,
            "stream": true,
        });
        if !system_prompt.is_empty() {
            body["system"] = json!(system_prompt);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools.iter().map(tool_definition_to_anthropic).collect::<Vec<_>>());
        }
        body
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn stream_completion(
        &self,
        system_prompt: String,
        messages: Vec<ConversationMessage>,
        tools: Vec<ToolDefinition>,
        max_tokens: u32,
    ) -> Result<EventStream, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(&system_prompt, &messages, &tools, max_tokens);

        debug!(model = %self.model, url = %url, tools = tools.len(), "starting Anthropic streaming request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let response = check_status(response).await?;
        Ok(decode_response(response, BlockTracker::new()))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
