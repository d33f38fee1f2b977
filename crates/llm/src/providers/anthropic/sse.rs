//! SSE event decoding and content-block state tracking for the Anthropic streaming API.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{trace, warn};

use telos_tool_runtime::{LlmError, StopReason, StreamEvent, ToolCall};

use crate::providers::sse::SseDecoder;

/// Per-block state keyed by content-block index.
#[derive(Debug)]
pub(super) enum Block {
    Text,
    ToolUse {
        id: String,
        name: String,
        partial_json: String,
    },
}

/// Assembles tool-use blocks from their streamed JSON fragments and
/// emits each call once its block stops.
#[derive(Debug, Default)]
pub(super) struct BlockTracker {
    blocks: BTreeMap<u64, Block>,
    stop_reason: Option<StopReason>,
    /// Tool blocks whose input did not parse, with the parse error. Only a
    /// `max_tokens` stop explains them; any other ending is malformed.
    truncated: Vec<(String, String)>,
}

impl BlockTracker {
    pub(super) fn new() -> Self {
        Self::default()
    }

    fn block_start(&mut self, parsed: &Value) -> Vec<StreamEvent> {
        let index = parsed["index"].as_u64().unwrap_or(0);
        let block = &parsed["content_block"];
        match block["type"].as_str() {
            Some("text") => {
                self.blocks.insert(index, Block::Text);
                match block["text"].as_str() {
                    Some(text) if !text.is_empty() => vec![StreamEvent::text(text)],
                    _ => Vec::new(),
                }
            }
            Some("tool_use") => {
                self.blocks.insert(
                    index,
                    Block::ToolUse {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        partial_json: String::new(),
                    },
                );
                Vec::new()
            }
            other => {
                trace!(block_type = ?other, "ignoring content block");
                Vec::new()
            }
        }
    }

    fn block_delta(&mut self, parsed: &Value) -> Result<Vec<StreamEvent>, LlmError> {
        let index = parsed["index"].as_u64().unwrap_or(0);
        let delta = &parsed["delta"];
        match delta["type"].as_str() {
            Some("text_delta") => Ok(delta["text"]
                .as_str()
                .filter(|t| !t.is_empty())
                .map(|t| vec![StreamEvent::text(t)])
                .unwrap_or_default()),
            Some("input_json_delta") => {
                let fragment = delta["partial_json"].as_str().unwrap_or_default();
                match self.blocks.get_mut(&index) {
                    Some(Block::ToolUse { partial_json, .. }) => {
                        partial_json.push_str(fragment);
                        Ok(Vec::new())
                    }
                    _ => Err(LlmError::MalformedStream(format!(
                        "input_json_delta for unknown tool block {index}"
                    ))),
                }
            }
            _ => Ok(Vec::new()),
        }
    }

    fn block_stop(&mut self, parsed: &Value) -> Result<Vec<StreamEvent>, LlmError> {
        let index = parsed["index"].as_u64().unwrap_or(0);
        match self.blocks.remove(&index) {
            Some(Block::ToolUse {
                id,
                name,
                partial_json,
            }) => {
                let input = if partial_json.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    match serde_json::from_str(&partial_json) {
                        Ok(input) => input,
                        Err(e) => {
                            self.truncated.push((name, e.to_string()));
                            return Ok(Vec::new());
                        }
                    }
                };
                Ok(vec![StreamEvent::ToolCall(ToolCall { id, name, input })])
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Tool blocks that started but never stopped.
    pub(super) fn open_tool_blocks(&self) -> usize {
        self.blocks
            .values()
            .filter(|b| matches!(b, Block::ToolUse { .. }))
            .count()
    }

    /// Final event for a finished message. Tool input cut off by the token
    /// limit is dropped; anything else left incomplete is an error.
    fn done(&mut self, reason: StopReason) -> Result<Vec<StreamEvent>, LlmError> {
        if reason == StopReason::MaxTokens {
            for (name, _) in self.truncated.drain(..) {
                warn!(tool = %name, "dropping tool call truncated by max_tokens");
            }
            let open = std::mem::take(&mut self.blocks);
            for block in open.into_values() {
                if let Block::ToolUse { name, .. } = block {
                    warn!(tool = %name, "dropping tool call truncated by max_tokens");
                }
            }
        }
        if let Some((name, error)) = self.truncated.first() {
            return Err(LlmError::MalformedStream(format!(
                "tool input for '{name}' is not JSON: {error}"
            )));
        }
        if self.open_tool_blocks() > 0 {
            return Err(LlmError::MalformedStream(
                "message stopped with an unfinished tool block".to_string(),
            ));
        }
        Ok(vec![StreamEvent::done(reason)])
    }
}

fn parse(data: &str) -> Result<Value, LlmError> {
    serde_json::from_str(data).map_err(|e| LlmError::MalformedStream(format!("invalid event data: {e}")))
}

impl SseDecoder for BlockTracker {
    fn handle(&mut self, event: &str, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        match event {
            "content_block_start" => Ok(self.block_start(&parse(data)?)),
            "content_block_delta" => self.block_delta(&parse(data)?),
            "content_block_stop" => self.block_stop(&parse(data)?),
            "message_delta" => {
                let parsed = parse(data)?;
                if let Some(reason) = parsed["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(StopReason::from_wire(reason));
                }
                Ok(Vec::new())
            }
            "message_stop" => self.done(self.stop_reason.unwrap_or(StopReason::EndTurn)),
            "error" => {
                let message = serde_json::from_str::<Value>(data)
                    .ok()
                    .and_then(|v| v["error"]["message"].as_str().map(String::from))
                    .unwrap_or_else(|| data.to_string());
                Err(LlmError::StreamError(message))
            }
            "message_start" | "ping" => Ok(Vec::new()),
            other => {
                trace!(event_type = other, "ignoring unknown SSE event type");
                Ok(Vec::new())
            }
        }
    }

    fn finish(&mut self) -> Result<Vec<StreamEvent>, LlmError> {
        // A body that ends after message_delta but before message_stop still
        // carries a usable stop reason.
        match self.stop_reason {
            Some(reason) => self.done(reason),
            None => Ok(Vec::new()),
        }
    }
}
