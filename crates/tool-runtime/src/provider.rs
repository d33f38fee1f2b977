use crate::conversation::ConversationMessage;
use crate::stream::StreamEvent;
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of canonical events for one provider round.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Trait for completion backends that support tool use and streaming.
///
/// This trait lives in tool-runtime (not in crates/llm) because it's
/// defined by the consumer (the execution engine), not the provider.
/// Implementations live in crates/llm.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Stream one round. `tools` may be empty, in which case no tool
    /// declarations are sent.
    async fn stream_completion(
        &self,
        system_prompt: String,
        messages: Vec<ConversationMessage>,
        tools: Vec<ToolDefinition>,
        max_tokens: u32,
    ) -> Result<EventStream, LlmError>;

    /// Non-streaming convenience: the concatenated text of one tool-less round.
    async fn complete_text(
        &self,
        system_prompt: String,
        messages: Vec<ConversationMessage>,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        use futures::StreamExt;
        let mut stream = self
            .stream_completion(system_prompt, messages, Vec::new(), max_tokens)
            .await?;
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Text { delta } => text.push_str(&delta),
                StreamEvent::ToolCall(_) => {}
                StreamEvent::Done { .. } => return Ok(text),
            }
        }
        Err(LlmError::MalformedStream(
            "stream ended without a terminal event".to_string(),
        ))
    }

    /// Provider name for logging (e.g., "anthropic", "openai-compat")
    fn provider_name(&self) -> &str;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Authentication failed: {0}")]
    AuthError(String),
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error("Malformed stream: {0}")]
    MalformedStream(String),
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Mock provider for testing the execution engine without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::stream::StopReason;
    use crate::tool::ToolCall;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// What the mock saw on one `stream_completion` call.
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub system_prompt: String,
        pub messages: Vec<ConversationMessage>,
        pub tools: Vec<ToolDefinition>,
        pub max_tokens: u32,
    }

    enum Scripted {
        Stream(Vec<Result<StreamEvent, LlmError>>),
        Reject(LlmError),
    }

    /// A mock provider that replays scripted rounds in FIFO order.
    ///
    /// When the script runs out it repeats the `repeat_when_empty` round if one
    /// is set, otherwise it ends the turn with no content.
    pub struct MockProvider {
        script: Mutex<VecDeque<Scripted>>,
        fallback: Mutex<Option<Vec<StreamEvent>>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Queue a round that yields these events.
        pub fn queue_response(&self, events: Vec<StreamEvent>) {
            self.script
                .lock()
                .unwrap()
                .push_back(Scripted::Stream(events.into_iter().map(Ok).collect()));
        }

        /// Queue a simple text round.
        pub fn queue_text(&self, text: &str) {
            self.queue_response(vec![
                StreamEvent::text(text),
                StreamEvent::done(StopReason::EndTurn),
            ]);
        }

        /// Queue a round that requests the given tool calls.
        pub fn queue_tool_calls(&self, calls: Vec<ToolCall>) {
            let mut events: Vec<StreamEvent> = calls.into_iter().map(StreamEvent::ToolCall).collect();
            events.push(StreamEvent::done(StopReason::ToolUse));
            self.queue_response(events);
        }

        /// Queue a round that yields `events` and then fails mid-stream.
        pub fn queue_failure_after(&self, events: Vec<StreamEvent>, error: LlmError) {
            let mut items: Vec<_> = events.into_iter().map(Ok).collect();
            items.push(Err(error));
            self.script
                .lock()
                .unwrap()
                .push_back(Scripted::Stream(items));
        }

        /// Queue a round whose request is rejected before any event.
        pub fn queue_request_error(&self, error: LlmError) {
            self.script
                .lock()
                .unwrap()
                .push_back(Scripted::Reject(error));
        }

        pub fn repeat_when_empty(&self, events: Vec<StreamEvent>) {
            *self.fallback.lock().unwrap() = Some(events);
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Default for MockProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CompletionProvider for MockProvider {
        async fn stream_completion(
            &self,
            system_prompt: String,
            messages: Vec<ConversationMessage>,
            tools: Vec<ToolDefinition>,
            max_tokens: u32,
        ) -> Result<EventStream, LlmError> {
            self.requests.lock().unwrap().push(RecordedRequest {
                system_prompt,
                messages,
                tools,
                max_tokens,
            });

            let next = self.script.lock().unwrap().pop_front();
            let items = match next {
                Some(Scripted::Stream(items)) => items,
                Some(Scripted::Reject(error)) => return Err(error),
                None => self
                    .fallback
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| vec![StreamEvent::done(StopReason::EndTurn)])
                    .into_iter()
                    .map(Ok)
                    .collect(),
            };
            Ok(Box::pin(stream::iter(items)))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }
}
