//! Translation between provider-agnostic conversation types and the Anthropic API format.

use serde_json::{json, Value};

use telos_tool_runtime::{ContentBlock, ConversationMessage, Role, ToolDefinition};

/// Translate a [`ToolDefinition`] into the Anthropic API tool format.
pub(super) fn tool_definition_to_anthropic(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

/// Translate a [`ConversationMessage`] into an Anthropic API message object.
///
/// Tool results travel as `tool_result` blocks inside a `user` message.
pub(super) fn message_to_anthropic(msg: &ConversationMessage) -> Value {
    let role = match msg.role {
        Role::Assistant => "assistant",
        Role::User | Role::Tool => "user",
    };

    if let [ContentBlock::Text { text }] = msg.content.as_slice() {
        return json!({"role": role, "content": text});
    }

    let blocks: Vec<Value> = msg.content.iter().map(block_to_anthropic).collect();
    json!({"role": role, "content": blocks})
}

fn block_to_anthropic(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::ToolUse(call) => json!({
            "type": "tool_use",
            "id": call.id,
            "name": call.name,
            "input": call.input,
        }),
        ContentBlock::ToolResult(result) => json!({
            "type": "tool_result",
            "tool_use_id": result.tool_call_id,
            "content": result.content,
            "is_error": result.is_error,
        }),
    }
}
