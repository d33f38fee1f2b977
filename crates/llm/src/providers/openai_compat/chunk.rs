//! Streamed chat-completion chunks → canonical events.
//!
//! Tool-call fragments arrive keyed by `index`; they are accumulated and
//! emitted after the text, just before `Done`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use telos_tool_runtime::{LlmError, StopReason, StreamEvent, ToolCall};

use crate::providers::sse::SseDecoder;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Default)]
pub(super) struct ChunkDecoder {
    calls: BTreeMap<usize, PartialCall>,
    finish_reason: Option<String>,
}

impl ChunkDecoder {
    pub(super) fn new() -> Self {
        Self::default()
    }

    fn complete(&mut self) -> Result<Vec<StreamEvent>, LlmError> {
        let reported = StopReason::from_wire(self.finish_reason.as_deref().unwrap_or("stop"));
        let calls = std::mem::take(&mut self.calls);
        let mut events = Vec::with_capacity(calls.len() + 1);
        for (index, partial) in calls {
            let input = if partial.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                match serde_json::from_str(&partial.arguments) {
                    Ok(input) => input,
                    Err(_) if reported == StopReason::MaxTokens => {
                        warn!(tool = %partial.name, "dropping tool call truncated by length limit");
                        continue;
                    }
                    Err(e) => {
                        return Err(LlmError::MalformedStream(format!(
                            "arguments for '{}' are not JSON: {e}",
                            partial.name
                        )));
                    }
                }
            };
            let id = if partial.id.is_empty() {
                format!("call_{index}")
            } else {
                partial.id
            };
            events.push(StreamEvent::ToolCall(ToolCall {
                id,
                name: partial.name,
                input,
            }));
        }

        // Some servers report "stop" even when they returned tool calls. A
        // length stop is kept as is.
        let stop_reason = if events.is_empty() || reported == StopReason::MaxTokens {
            reported
        } else {
            StopReason::ToolUse
        };
        events.push(StreamEvent::done(stop_reason));
        Ok(events)
    }
}

impl SseDecoder for ChunkDecoder {
    fn handle(&mut self, _event: &str, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        let data = data.trim();
        if data == DONE_SENTINEL {
            return self.complete();
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let chunk: Chunk = serde_json::from_str(data)
            .map_err(|e| LlmError::MalformedStream(format!("invalid chunk: {e}")))?;

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::text(text));
            }
            for delta in choice.delta.tool_calls {
                let partial = self.calls.entry(delta.index).or_default();
                if let Some(id) = delta.id {
                    partial.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        partial.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial.arguments.push_str(&arguments);
                    }
                }
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
        }
        Ok(events)
    }

    fn finish(&mut self) -> Result<Vec<StreamEvent>, LlmError> {
        // Servers that close the body without the sentinel still end cleanly
        // once a finish reason has been seen.
        if self.finish_reason.is_some() {
            self.complete()
        } else {
            Ok(Vec::new())
        }
    }
}
