//! Both providers against a local axum server replaying canned SSE bodies.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};

use telos_llm::{AnthropicProvider, OpenAiCompatProvider};
use telos_tool_runtime::{
    CompletionProvider, ConversationMessage, LlmError, StopReason, StreamEvent, ToolDefinition,
    ToolOrigin,
};

#[derive(Clone)]
struct Canned {
    status: StatusCode,
    body: &'static str,
    seen: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

async fn reply(
    State(canned): State<Canned>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    canned.seen.lock().unwrap().push((headers, body));
    (
        canned.status,
        [(header::CONTENT_TYPE, "text/event-stream")],
        canned.body,
    )
}

async fn serve(path: &str, status: StatusCode, body: &'static str) -> (String, Canned) {
    let canned = Canned {
        status,
        body,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route(path, post(reply))
        .with_state(canned.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), canned)
}

async fn collect(
    provider: &dyn CompletionProvider,
    tools: Vec<ToolDefinition>,
) -> Vec<Result<StreamEvent, LlmError>> {
    let stream = provider
        .stream_completion(
            "be useful".into(),
            vec![ConversationMessage::user("list my notes")],
            tools,
            256,
        )
        .await
        .unwrap();
    stream.collect().await
}

fn list_tool() -> ToolDefinition {
    ToolDefinition {
        name: "list_directory".into(),
        description: "List a directory".into(),
        input_schema: json!({"type": "object", "properties": {"path": {"type": "string"}}}),
        origin: ToolOrigin::Builtin,
    }
}

const ANTHROPIC_TOOL_ROUND: &str = "event: message_start
data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}

event: content_block_start
data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}

event: content_block_delta
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Looking.\"}}

event: content_block_stop
data: {\"type\":\"content_block_stop\",\"index\":0}

event: content_block_start
data: {\"type\":\"content_block_start\",\"index\":1,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_1\",\"name\":\"list_directory\",\"input\":{}}}

event: content_block_delta
data: {\"type\":\"content_block_delta\",\"index\":1,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"path\\\": \\\"notes\\\"}\"}}

event: content_block_stop
data: {\"type\":\"content_block_stop\",\"index\":1}

event: message_delta
data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"}}

event: message_stop
data: {\"type\":\"message_stop\"}

";

#[tokio::test]
async fn test_anthropic_tool_round() {
    let (base, canned) = serve("/v1/messages", StatusCode::OK, ANTHROPIC_TOOL_ROUND).await;
    let provider = AnthropicProvider::new("sk-test".into(), "claude-test".into(), base);

    let events: Vec<StreamEvent> = collect(&provider, vec![list_tool()])
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(
        events,
        vec![
            StreamEvent::text("Looking."),
            StreamEvent::tool_call("toolu_1", "list_directory", json!({"path": "notes"})),
            StreamEvent::done(StopReason::ToolUse),
        ]
    );

    let seen = canned.seen.lock().unwrap();
    let (headers, body) = &seen[0];
    assert_eq!(headers["x-api-key"], "sk-test");
    assert_eq!(headers["anthropic-version"], "2023-06-01");
    assert_eq!(body["system"], "be useful");
    assert_eq!(body["tools"][0]["name"], "list_directory");
}

#[tokio::test]
async fn test_anthropic_unauthorized() {
    let (base, _) = serve("/v1/messages", StatusCode::UNAUTHORIZED, "invalid x-api-key").await;
    let provider = AnthropicProvider::new("bad".into(), "claude-test".into(), base);

    let err = provider
        .stream_completion(String::new(), vec![ConversationMessage::user("hi")], vec![], 16)
        .await
        .err()
        .unwrap();
    match err {
        LlmError::AuthError(message) => assert!(message.contains("invalid x-api-key")),
        other => panic!("expected AuthError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_anthropic_server_error_status() {
    let (base, _) = serve("/v1/messages", StatusCode::SERVICE_UNAVAILABLE, "busy").await;
    let provider = AnthropicProvider::new("k".into(), "claude-test".into(), base);

    let err = provider
        .stream_completion(String::new(), vec![ConversationMessage::user("hi")], vec![], 16)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, LlmError::ApiError { status: 503, .. }));
}

const ANTHROPIC_BROKEN: &str = "event: content_block_delta
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"partial\"}}

event: content_block_delta
data: not json at all

event: content_block_delta
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"never\"}}

";

#[tokio::test]
async fn test_malformed_event_terminates_stream() {
    let (base, _) = serve("/v1/messages", StatusCode::OK, ANTHROPIC_BROKEN).await;
    let provider = AnthropicProvider::new("k".into(), "claude-test".into(), base);

    let items = collect(&provider, vec![]).await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), &StreamEvent::text("partial"));
    assert!(matches!(items[1], Err(LlmError::MalformedStream(_))));
}

const OPENAI_TOOL_ROUND: &str = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"On it.\"}}]}

data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_9\",\"type\":\"function\",\"function\":{\"name\":\"list_directory\",\"arguments\":\"{\\\"path\\\":\"}}]}}]}

data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"notes\\\"}\"}}]}}]}

data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}

data: [DONE]

";

#[tokio::test]
async fn test_openai_compat_tool_round() {
    let (base, canned) = serve("/v1/chat/completions", StatusCode::OK, OPENAI_TOOL_ROUND).await;
    let provider = OpenAiCompatProvider::new(
        format!("{base}/v1"),
        "qwen2.5".into(),
        Some("local-key".into()),
    );

    let events: Vec<StreamEvent> = collect(&provider, vec![list_tool()])
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(
        events,
        vec![
            StreamEvent::text("On it."),
            StreamEvent::tool_call("call_9", "list_directory", json!({"path": "notes"})),
            StreamEvent::done(StopReason::ToolUse),
        ]
    );

    let seen = canned.seen.lock().unwrap();
    let (headers, body) = &seen[0];
    assert_eq!(headers["authorization"], "Bearer local-key");
    assert_eq!(body["model"], "qwen2.5");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["tools"][0]["function"]["name"], "list_directory");
}

const OPENAI_TEXT_ONLY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"weekly\"}}]}

data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}

";

#[tokio::test]
async fn test_openai_compat_complete_text_without_sentinel() {
    let (base, canned) = serve("/v1/chat/completions", StatusCode::OK, OPENAI_TEXT_ONLY).await;
    let provider = OpenAiCompatProvider::new(format!("{base}/v1"), "qwen2.5".into(), None);

    let text = provider
        .complete_text("route".into(), vec![ConversationMessage::user("hi")], 64)
        .await
        .unwrap();
    assert_eq!(text, "weekly");

    let seen = canned.seen.lock().unwrap();
    assert!(seen[0].0.get("authorization").is_none());
    assert!(seen[0].1.get("tools").is_none());
}
