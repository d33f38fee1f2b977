//! Structured record of one skill execution.
//!
//! A trace holds enough to rebuild the exact message history the provider saw
//! before any round, so a run can be replayed against a scripted provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::ConversationMessage;
use crate::stream::StopReason;
use crate::tool::{ToolCall, ToolOrigin, ToolResult};

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    MaxRoundsExceeded,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::MaxRoundsExceeded => f.write_str("max_rounds_exceeded"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    SkillStart {
        ts: DateTime<Utc>,
        run_id: String,
        skill_id: String,
        provider: String,
        model: String,
        has_mcp: bool,
        tools: Vec<String>,
        system_prompt: String,
        /// The seed user message exactly as sent.
        request: String,
    },
    AssistantTurn {
        ts: DateTime<Utc>,
        round: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        stop_reason: StopReason,
    },
    ToolCall {
        ts: DateTime<Utc>,
        round: usize,
        id: String,
        tool: String,
        /// `None` when the model named a tool that is not registered.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<ToolOrigin>,
        input: Value,
        content: String,
        is_error: bool,
        duration_ms: u64,
    },
    SkillEnd {
        ts: DateTime<Utc>,
        duration_ms: u64,
        rounds: usize,
        tool_calls: usize,
        status: RunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<StopReason>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial_text: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    events: Vec<TraceEvent>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<TraceEvent>) -> Self {
        Self { events }
    }

    pub(crate) fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn run_id(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match e {
            TraceEvent::SkillStart { run_id, .. } => Some(run_id.as_str()),
            _ => None,
        })
    }

    /// Number of completed provider rounds.
    pub fn rounds(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TraceEvent::AssistantTurn { .. }))
            .count()
    }

    pub fn tool_call_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TraceEvent::ToolCall { .. }))
            .count()
    }

    pub fn status(&self) -> Option<RunStatus> {
        self.events.iter().rev().find_map(|e| match e {
            TraceEvent::SkillEnd { status, .. } => Some(*status),
            _ => None,
        })
    }

    /// The full message history the run produced.
    pub fn reconstruct_messages(&self) -> Vec<ConversationMessage> {
        self.replay(None)
    }

    /// The history that was sent to the provider for `round` (1-based).
    pub fn messages_before_round(&self, round: usize) -> Vec<ConversationMessage> {
        self.replay(Some(round))
    }

    fn replay(&self, before_round: Option<usize>) -> Vec<ConversationMessage> {
        let in_range = |round: usize| before_round.map_or(true, |limit| round < limit);

        let mut messages = Vec::new();
        let mut results: Vec<ToolResult> = Vec::new();
        let flush = |messages: &mut Vec<ConversationMessage>, results: &mut Vec<ToolResult>| {
            if !results.is_empty() {
                messages.push(ConversationMessage::tool_results(std::mem::take(results)));
            }
        };

        for event in &self.events {
            match event {
                TraceEvent::SkillStart { request, .. } => {
                    messages.push(ConversationMessage::user(request.clone()));
                }
                TraceEvent::AssistantTurn {
                    round,
                    text,
                    tool_calls,
                    ..
                } if in_range(*round) => {
                    flush(&mut messages, &mut results);
                    messages.push(ConversationMessage::assistant(
                        text.clone(),
                        tool_calls.clone(),
                    ));
                }
                TraceEvent::ToolCall {
                    round,
                    id,
                    content,
                    is_error,
                    ..
                } if in_range(*round) => {
                    results.push(ToolResult {
                        tool_call_id: id.clone(),
                        content: content.clone(),
                        is_error: *is_error,
                    });
                }
                _ => {}
            }
        }
        flush(&mut messages, &mut results);
        messages
    }
}
