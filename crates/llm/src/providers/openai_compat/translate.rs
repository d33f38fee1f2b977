//! Canonical history → OpenAI chat-completions messages.
//!
//! The flat format has no content blocks: assistant tool calls ride in a
//! `tool_calls` array with JSON-string arguments, and each tool result is its
//! own `tool` message.

use serde_json::{json, Value};

use telos_tool_runtime::{ContentBlock, ConversationMessage, Role, ToolDefinition};

pub(super) fn tool_definition_to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

pub(super) fn messages_to_openai(system_prompt: &str, messages: &[ConversationMessage]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        out.push(json!({"role": "system", "content": system_prompt}));
    }

    for msg in messages {
        match msg.role {
            Role::User => out.push(json!({"role": "user", "content": msg.text()})),
            Role::Assistant => {
                let text = msg.text();
                let mut wire = json!({
                    "role": "assistant",
                    "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                });
                let calls: Vec<Value> = msg
                    .tool_calls()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.input.to_string(),
                            }
                        })
                    })
                    .collect();
                if !calls.is_empty() {
                    wire["tool_calls"] = Value::Array(calls);
                }
                out.push(wire);
            }
            Role::Tool => {
                for block in &msg.content {
                    if let ContentBlock::ToolResult(result) = block {
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": result.tool_call_id,
                            "content": result.content,
                        }));
                    }
                }
            }
        }
    }
    out
}
