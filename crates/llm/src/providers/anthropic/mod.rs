//! Anthropic Messages API implementation of [`CompletionProvider`](telos_tool_runtime::CompletionProvider).
//!
//! Supports streaming tool use via SSE, translating between the structured-block
//! wire format and the provider-agnostic [`StreamEvent`](telos_tool_runtime::StreamEvent) /
//! [`ConversationMessage`](telos_tool_runtime::ConversationMessage) types.

mod sse;
mod streaming;
mod translate;

pub use self::streaming::AnthropicProvider;
