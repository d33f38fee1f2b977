use crate::conversation::{Conversation, ConversationMessage};
use crate::provider::{CompletionProvider, LlmError};
use crate::registry::ToolRegistry;
use crate::stream::{StopReason, StreamEvent};
use crate::tool::{ToolCall, ToolContext, ToolOrigin, ToolResult};
use crate::trace::{ExecutionTrace, RunStatus, TraceEvent};
use chrono::{DateTime, Local, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use telos_core::Skill;
use tracing::{debug, info, warn};

/// Receives assistant text deltas as they stream in.
pub type TextSink = Arc<dyn Fn(&str) + Send + Sync>;

/// The bounded loop that drives one skill execution.
///
/// Flow: seed → provider round → tool calls → results → provider round → ... → final text
///
/// Every tool invocation gets exactly one result before the next round is
/// requested; tool failures become `is_error` results and never abort the run.
/// Provider failures end the run with an [`ExecutionFailure`].
pub struct ExecutionEngine {
    provider: Arc<dyn CompletionProvider>,
    registry: Arc<ToolRegistry>,
    max_rounds: usize,
    max_tokens: u32,
    text_sink: Option<TextSink>,
}

impl ExecutionEngine {
    pub const DEFAULT_MAX_ROUNDS: usize = 20;
    pub const DEFAULT_MAX_TOKENS: u32 = 16384;

    pub fn new(provider: Arc<dyn CompletionProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            max_rounds: Self::DEFAULT_MAX_ROUNDS,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            text_sink: None,
        }
    }

    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_text_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.text_sink = Some(Arc::new(sink));
        self
    }

    /// Run `skill` to completion.
    ///
    /// The skill body is the system prompt; the seed user message is the
    /// request (or a generic instruction) stamped with the current time.
    pub async fn execute(
        &self,
        skill: &Skill,
        request: Option<&str>,
        context: &ToolContext,
    ) -> Result<ExecutionOutcome, ExecutionFailure> {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let tools = self.registry.list();
        let seed = seed_message(request, Local::now());

        let mut trace = ExecutionTrace::new();
        trace.push(TraceEvent::SkillStart {
            ts: Utc::now(),
            run_id: run_id.clone(),
            skill_id: skill.id.clone(),
            provider: self.provider.provider_name().to_string(),
            model: self.provider.model().to_string(),
            has_mcp: self.registry.has_remote_tools(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
            system_prompt: skill.prompt_body.clone(),
            request: seed.clone(),
        });

        info!(
            run_id = %run_id,
            skill = %skill.id,
            provider = self.provider.provider_name(),
            model = self.provider.model(),
            tools = tools.len(),
            "skill start"
        );

        let mut conversation = Conversation::new(skill.prompt_body.clone());
        conversation.add_user_message(seed);

        let mut tool_call_count = 0usize;
        let mut round = 0usize;

        loop {
            round += 1;
            debug_assert!(conversation.unresolved_tool_calls().is_empty());
            debug!(round, "requesting provider round");

            let mut turn = match self.stream_round(&conversation, &tools).await {
                Ok(turn) => turn,
                Err(failure) => {
                    warn!(round, error = %failure.error, "provider round failed");
                    trace.push(TraceEvent::SkillEnd {
                        ts: Utc::now(),
                        duration_ms: elapsed_ms(started),
                        rounds: round - 1,
                        tool_calls: tool_call_count,
                        status: RunStatus::Failed,
                        stop_reason: None,
                        error: Some(failure.error.to_string()),
                        partial_text: Some(failure.partial_text.clone()).filter(|t| !t.is_empty()),
                    });
                    return Err(ExecutionFailure {
                        source: failure.error,
                        round,
                        partial_text: failure.partial_text,
                        messages: conversation.into_messages(),
                        trace,
                    });
                }
            };

            // Calls from a turn that stopped for another reason are never
            // dispatched, so they must not enter the history unanswered.
            if turn.stop_reason != StopReason::ToolUse && !turn.tool_calls.is_empty() {
                warn!(
                    round,
                    stop_reason = ?turn.stop_reason,
                    dropped = turn.tool_calls.len(),
                    "discarding tool calls from a turn that did not stop for tool use"
                );
                turn.tool_calls.clear();
            }

            let text = Some(turn.text.clone()).filter(|t| !t.is_empty());
            trace.push(TraceEvent::AssistantTurn {
                ts: Utc::now(),
                round,
                text: text.clone(),
                tool_calls: turn.tool_calls.clone(),
                stop_reason: turn.stop_reason,
            });
            conversation.add_assistant_turn(text, turn.tool_calls.clone());

            if turn.stop_reason != StopReason::ToolUse || turn.tool_calls.is_empty() {
                info!(round, stop_reason = ?turn.stop_reason, "skill complete");
                return Ok(self.finish(
                    trace,
                    conversation,
                    FinishState {
                        run_id,
                        started,
                        round,
                        tool_call_count,
                        status: RunStatus::Completed,
                        stop_reason: turn.stop_reason,
                        final_text: turn.text,
                    },
                ));
            }

            info!(round, count = turn.tool_calls.len(), "executing tool calls");
            let dispatched = futures::future::join_all(
                turn.tool_calls.iter().map(|call| self.dispatch(call, context)),
            )
            .await;

            let mut results = Vec::with_capacity(dispatched.len());
            for (call, record) in turn.tool_calls.iter().zip(dispatched) {
                trace.push(TraceEvent::ToolCall {
                    ts: Utc::now(),
                    round,
                    id: call.id.clone(),
                    tool: call.name.clone(),
                    origin: record.origin,
                    input: call.input.clone(),
                    content: record.result.content.clone(),
                    is_error: record.result.is_error,
                    duration_ms: record.duration_ms,
                });
                results.push(record.result);
            }
            tool_call_count += results.len();
            conversation.add_tool_results(results);

            if round >= self.max_rounds {
                warn!(round, max_rounds = self.max_rounds, "round limit reached");
                return Ok(self.finish(
                    trace,
                    conversation,
                    FinishState {
                        run_id,
                        started,
                        round,
                        tool_call_count,
                        status: RunStatus::MaxRoundsExceeded,
                        stop_reason: turn.stop_reason,
                        final_text: turn.text,
                    },
                ));
            }
        }
    }

    fn finish(
        &self,
        mut trace: ExecutionTrace,
        conversation: Conversation,
        state: FinishState,
    ) -> ExecutionOutcome {
        trace.push(TraceEvent::SkillEnd {
            ts: Utc::now(),
            duration_ms: elapsed_ms(state.started),
            rounds: state.round,
            tool_calls: state.tool_call_count,
            status: state.status,
            stop_reason: Some(state.stop_reason),
            error: None,
            partial_text: None,
        });
        ExecutionOutcome {
            run_id: state.run_id,
            status: state.status,
            stop_reason: state.stop_reason,
            rounds: state.round,
            final_text: state.final_text,
            messages: conversation.into_messages(),
            trace,
        }
    }

    /// Consume one provider stream until its terminal event.
    async fn stream_round(
        &self,
        conversation: &Conversation,
        tools: &[crate::tool::ToolDefinition],
    ) -> Result<RoundOutput, RoundFailure> {
        let mut stream = self
            .provider
            .stream_completion(
                conversation.system_prompt().to_string(),
                conversation.messages().to_vec(),
                tools.to_vec(),
                self.max_tokens,
            )
            .await
            .map_err(|error| RoundFailure {
                error,
                partial_text: String::new(),
            })?;

        let mut text = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();

        while let Some(event) = stream.next().await {
            match event {
                Ok(StreamEvent::Text { delta }) => {
                    if let Some(sink) = &self.text_sink {
                        sink(&delta);
                    }
                    text.push_str(&delta);
                }
                Ok(StreamEvent::ToolCall(call)) => tool_calls.push(call),
                Ok(StreamEvent::Done { stop_reason }) => {
                    return Ok(RoundOutput {
                        text,
                        tool_calls,
                        stop_reason,
                    });
                }
                Err(error) => {
                    return Err(RoundFailure {
                        error,
                        partial_text: text,
                    });
                }
            }
        }

        Err(RoundFailure {
            error: LlmError::MalformedStream("stream ended without a terminal event".to_string()),
            partial_text: text,
        })
    }

    async fn dispatch(&self, call: &ToolCall, context: &ToolContext) -> DispatchRecord {
        let started = Instant::now();
        let (origin, result) = match self.registry.get(&call.name) {
            Some(tool) => {
                let origin = tool.definition().origin;
                let result = match tool.execute(call.input.clone(), context).await {
                    Ok(result) => result,
                    Err(e) => ToolResult::error(e.to_string()),
                };
                (Some(origin), result)
            }
            None => (None, ToolResult::error(format!("Unknown tool: {}", call.name))),
        };
        let result = result.for_call(&call.id);

        info!(
            tool = %call.name,
            is_error = result.is_error,
            duration_ms = elapsed_ms(started),
            "tool call"
        );

        DispatchRecord {
            origin,
            result,
            duration_ms: elapsed_ms(started),
        }
    }
}

/// Seed user message for a run.
pub fn seed_message(request: Option<&str>, now: DateTime<Local>) -> String {
    let request = request
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("Execute this skill.");
    format!("{request}\n\nCurrent date/time: {}", now.to_rfc3339())
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

struct RoundOutput {
    text: String,
    tool_calls: Vec<ToolCall>,
    stop_reason: StopReason,
}

struct RoundFailure {
    error: LlmError,
    partial_text: String,
}

struct DispatchRecord {
    origin: Option<ToolOrigin>,
    result: ToolResult,
    duration_ms: u64,
}

struct FinishState {
    run_id: String,
    started: Instant,
    round: usize,
    tool_call_count: usize,
    status: RunStatus,
    stop_reason: StopReason,
    final_text: String,
}

/// A run that reached a terminal state without a provider failure.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub run_id: String,
    pub status: RunStatus,
    /// Stop reason of the last round.
    pub stop_reason: StopReason,
    pub rounds: usize,
    /// Text of the last assistant turn.
    pub final_text: String,
    pub messages: Vec<ConversationMessage>,
    pub trace: ExecutionTrace,
}

/// A provider failure that ended the run. Carries what was produced so far.
#[derive(Debug, thiserror::Error)]
#[error("provider failed in round {round}: {source}")]
pub struct ExecutionFailure {
    pub source: LlmError,
    pub round: usize,
    /// Text streamed in the failing round before the error.
    pub partial_text: String,
    pub messages: Vec<ConversationMessage>,
    pub trace: ExecutionTrace,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use crate::tool::EchoTool;
    use crate::conversation::Role;
    use std::sync::Mutex;

    fn skill() -> Skill {
        Skill::new("daily-note", "Write today's note", "You write daily notes.")
    }

    fn call(id: &str, name: &str, input: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }
    }

    fn setup(registry: ToolRegistry) -> (ExecutionEngine, Arc<MockProvider>) {
        let provider = Arc::new(MockProvider::new());
        let engine = ExecutionEngine::new(
            provider.clone() as Arc<dyn CompletionProvider>,
            Arc::new(registry),
        );
        (engine, provider)
    }

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::with_builtins();
        registry.register(EchoTool).unwrap();
        registry
    }

    #[test]
    fn test_seed_message() {
        let now = Local::now();
        let seed = seed_message(Some("  plan my week "), now);
        assert!(seed.starts_with("plan my week\n\nCurrent date/time: "));
        assert!(seed.ends_with(&now.to_rfc3339()));

        let seed = seed_message(None, now);
        assert!(seed.starts_with("Execute this skill.\n\nCurrent date/time: "));
        assert!(seed_message(Some("   "), now).starts_with("Execute this skill."));
    }

    #[tokio::test]
    async fn test_simple_text_response() {
        let (engine, provider) = setup(echo_registry());
        provider.queue_text("Hello, here is your note.");

        let outcome = engine
            .execute(&skill(), Some("Hello"), &ToolContext::new("/tmp"))
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.stop_reason, StopReason::EndTurn);
        assert_eq!(outcome.final_text, "Hello, here is your note.");
        assert_eq!(outcome.messages.len(), 2);

        let request = &provider.requests()[0];
        assert_eq!(request.system_prompt, "You write daily notes.");
        assert_eq!(request.tools.len(), 6);
        assert_eq!(request.max_tokens, ExecutionEngine::DEFAULT_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_text_sink_receives_deltas_in_order() {
        let (engine, provider) = setup(ToolRegistry::new());
        provider.queue_response(vec![
            StreamEvent::text("Hel"),
            StreamEvent::text("lo"),
            StreamEvent::done(StopReason::EndTurn),
        ]);
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        let engine = engine.with_text_sink(move |delta| sink.lock().unwrap().push_str(delta));

        engine
            .execute(&skill(), None, &ToolContext::new("/tmp"))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_results_follow_call_order() {
        let (engine, provider) = setup(echo_registry());
        provider.queue_tool_calls(vec![
            call("c1", "echo", serde_json::json!({"message": "first"})),
            call("c2", "no_such_tool", serde_json::json!({})),
            call("c3", "echo", serde_json::json!({"message": "third"})),
        ]);
        provider.queue_text("Done!");

        let outcome = engine
            .execute(&skill(), Some("Echo test"), &ToolContext::new("/tmp"))
            .await
            .unwrap();

        // user, assistant (tool calls), tool results, assistant (text)
        assert_eq!(outcome.messages.len(), 4);
        let results: Vec<_> = outcome.messages[2].results().cloned().collect();
        let ids: Vec<_> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(results[0].content, "first");
        assert!(results[1].is_error);
        assert_eq!(results[1].content, "Unknown tool: no_such_tool");
        assert_eq!(results[2].content, "third");
        assert_eq!(outcome.trace.tool_call_count(), 3);
    }

    #[tokio::test]
    async fn test_tool_error_feeds_next_round() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, provider) = setup(ToolRegistry::with_builtins());
        provider.queue_tool_calls(vec![call(
            "r1",
            "read_file",
            serde_json::json!({"path": "missing.txt"}),
        )]);
        provider.queue_text("That file does not exist.");

        let outcome = engine
            .execute(&skill(), Some("read it"), &ToolContext::new(dir.path()))
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(provider.call_count(), 2);

        let second = &provider.requests()[1].messages;
        let result = second[2].results().next().unwrap();
        assert_eq!(second[2].role, Role::Tool);
        assert!(result.is_error);
        assert!(result.content.starts_with("Not found"));
    }

    #[tokio::test]
    async fn test_round_cap() {
        let (engine, provider) = setup(echo_registry());
        provider.repeat_when_empty(vec![
            StreamEvent::tool_call("loop", "echo", serde_json::json!({"message": "again"})),
            StreamEvent::done(StopReason::ToolUse),
        ]);

        let outcome = engine
            .execute(&skill(), Some("never stop"), &ToolContext::new("/tmp"))
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 20);
        assert_eq!(outcome.rounds, 20);
        assert_eq!(outcome.status, RunStatus::MaxRoundsExceeded);
        assert_eq!(outcome.trace.status(), Some(RunStatus::MaxRoundsExceeded));
        // Round 20's call still has its result.
        assert_eq!(outcome.trace.tool_call_count(), 20);
        assert_eq!(outcome.messages.last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn test_custom_round_cap() {
        let (engine, provider) = setup(echo_registry());
        let engine = engine.with_max_rounds(3);
        provider.repeat_when_empty(vec![
            StreamEvent::tool_call("loop", "echo", serde_json::json!({"message": "x"})),
            StreamEvent::done(StopReason::ToolUse),
        ]);
        let outcome = engine
            .execute(&skill(), None, &ToolContext::new("/tmp"))
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 3);
        assert_eq!(outcome.status, RunStatus::MaxRoundsExceeded);
    }

    #[tokio::test]
    async fn test_max_tokens_stop_is_done() {
        let (engine, provider) = setup(echo_registry());
        provider.queue_response(vec![
            StreamEvent::text("cut off"),
            StreamEvent::done(StopReason::MaxTokens),
        ]);
        let outcome = engine
            .execute(&skill(), None, &ToolContext::new("/tmp"))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.stop_reason, StopReason::MaxTokens);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_calls_on_max_tokens_stop_are_discarded() {
        let (engine, provider) = setup(echo_registry());
        provider.queue_response(vec![
            StreamEvent::text("Writing the note"),
            StreamEvent::tool_call("c1", "echo", serde_json::json!({"message": "hi"})),
            StreamEvent::done(StopReason::MaxTokens),
        ]);
        let outcome = engine
            .execute(&skill(), None, &ToolContext::new("/tmp"))
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.stop_reason, StopReason::MaxTokens);
        assert_eq!(outcome.final_text, "Writing the note");
        assert_eq!(outcome.trace.tool_call_count(), 0);
        assert!(outcome.messages.iter().all(|m| m.tool_calls().next().is_none()));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_failure() {
        let (engine, provider) = setup(echo_registry());
        provider.queue_tool_calls(vec![call("c1", "echo", serde_json::json!({"message": "hi"}))]);
        provider.queue_failure_after(
            vec![
                StreamEvent::text("Partial "),
                StreamEvent::text("answer"),
                StreamEvent::tool_call("c2", "echo", serde_json::json!({"message": "never"})),
            ],
            LlmError::NetworkError("connection reset".to_string()),
        );

        let failure = engine
            .execute(&skill(), None, &ToolContext::new("/tmp"))
            .await
            .unwrap_err();

        assert_eq!(failure.round, 2);
        assert_eq!(failure.partial_text, "Partial answer");
        assert!(matches!(failure.source, LlmError::NetworkError(_)));
        assert_eq!(failure.trace.status(), Some(RunStatus::Failed));
        // Only round 1's call was dispatched; nothing was invented for the failed round.
        assert_eq!(failure.trace.tool_call_count(), 1);
        assert_eq!(failure.messages.len(), 3);
        assert!(failure.messages.iter().all(|m| m.tool_calls().all(|c| c.id != "c2")));
    }

    #[tokio::test]
    async fn test_stream_without_done_is_malformed() {
        let (engine, provider) = setup(ToolRegistry::new());
        provider.queue_response(vec![StreamEvent::text("dangling")]);
        let failure = engine
            .execute(&skill(), None, &ToolContext::new("/tmp"))
            .await
            .unwrap_err();
        assert!(matches!(failure.source, LlmError::MalformedStream(_)));
        assert_eq!(failure.partial_text, "dangling");
    }

    #[tokio::test]
    async fn test_request_rejected_before_stream() {
        let (engine, provider) = setup(ToolRegistry::new());
        provider.queue_request_error(LlmError::AuthError("bad key".to_string()));
        let failure = engine
            .execute(&skill(), None, &ToolContext::new("/tmp"))
            .await
            .unwrap_err();
        assert_eq!(failure.round, 1);
        assert!(failure.partial_text.is_empty());
        assert_eq!(failure.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_trace_replays_each_round_history() {
        let (engine, provider) = setup(echo_registry());
        provider.queue_response(vec![
            StreamEvent::text("Looking"),
            StreamEvent::tool_call("a", "echo", serde_json::json!({"message": "1"})),
            StreamEvent::tool_call("b", "echo", serde_json::json!({"message": "2"})),
            StreamEvent::done(StopReason::ToolUse),
        ]);
        provider.queue_tool_calls(vec![call("c", "missing_tool", serde_json::json!({}))]);
        provider.queue_text("All done");

        let outcome = engine
            .execute(&skill(), Some("go"), &ToolContext::new("/tmp"))
            .await
            .unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        for (i, request) in requests.iter().enumerate() {
            assert_eq!(outcome.trace.messages_before_round(i + 1), request.messages);
        }
        assert_eq!(outcome.trace.reconstruct_messages(), outcome.messages);
    }
}
