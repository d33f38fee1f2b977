use serde::{Deserialize, Serialize};

use crate::tool::ToolCall;

/// Events emitted during a streamed provider round.
/// Provider-agnostic; translated from the Anthropic/OpenAI wire formats in the provider layer.
///
/// A well-formed round is zero or more `Text` and `ToolCall` events followed by
/// exactly one `Done`. Tool calls are only yielded once their arguments are complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of assistant text
    Text { delta: String },
    /// A fully-assembled tool invocation
    ToolCall(ToolCall),
    /// The round is complete
    Done { stop_reason: StopReason },
}

impl StreamEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        Self::Text {
            delta: delta.into(),
        }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self::ToolCall(ToolCall {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    pub fn done(stop_reason: StopReason) -> Self {
        Self::Done { stop_reason }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Normal end of response
    EndTurn,
    /// Model wants to use tools
    ToolUse,
    /// Hit max tokens limit
    MaxTokens,
}

impl StopReason {
    /// Map a wire-level stop string (Anthropic `stop_reason` or OpenAI
    /// `finish_reason`) onto the canonical set. Unknown values end the turn.
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "tool_use" | "tool_calls" | "function_call" => Self::ToolUse,
            "max_tokens" | "length" => Self::MaxTokens,
            _ => Self::EndTurn,
        }
    }
}
