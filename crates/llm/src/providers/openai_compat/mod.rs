//! OpenAI-style chat/function-calling provider, used for Ollama and other
//! self-hosted endpoints that speak `/v1/chat/completions`.

mod chunk;
mod translate;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use telos_tool_runtime::{
    CompletionProvider, ConversationMessage, EventStream, LlmError, ToolDefinition,
};

use self::chunk::ChunkDecoder;
use self::translate::{messages_to_openai, tool_definition_to_openai};
use crate::providers::sse::{check_status, decode_response};

pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    /// Base URL including the version prefix, e.g. `http://localhost:11434/v1`.
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    fn request_body(
        &self,
        system_prompt: &str,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
        max_tokens: u32,
    ) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages_to_openai(system_prompt, messages),
            "max_tokens": max_tokens,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools.iter().map(tool_definition_to_openai).collect::<Vec<_>>());
        }
        body
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn stream_completion(
        &self,
        system_prompt: String,
        messages: Vec<ConversationMessage>,
        tools: Vec<ToolDefinition>,
        max_tokens: u32,
    ) -> Result<EventStream, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&system_prompt, &messages, &tools, max_tokens);

        debug!(model = %self.model, url = %url, tools = tools.len(), "starting chat-completions stream");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let response = check_status(response).await?;
        Ok(decode_response(response, ChunkDecoder::new()))
    }

    fn provider_name(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let provider = OpenAiCompatProvider::new(
            "http://localhost:11434/v1/".into(),
            "llama3.1".into(),
            None,
        );
        assert_eq!(provider.base_url, "http://localhost:11434/v1");

        let body = provider.request_body("sys", &[ConversationMessage::user("hi")], &[], 128);
        assert_eq!(body["model"], "llama3.1");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 128);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body.get("tools").is_none());
    }
}
