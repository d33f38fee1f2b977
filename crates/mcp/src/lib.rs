//! MCP (Model Context Protocol) client for remote tool servers.
//!
//! # Architecture
//!
//! - **types**: JSON-RPC 2.0 and MCP-specific protocol types
//! - **transport**: streamable HTTP, legacy SSE and in-memory channel transports
//! - **client**: `McpSession` (handshake, discovery, `tools/call`) and the `McpTool` adapter
//! - **bridge**: `McpBridge`, the per-execution set of sessions
//! - **error**: Unified error types
//!
//! # Usage
//!
//! ```no_run
//! use telos_core::{EnvMap, McpServerConfig};
//! use telos_mcp::McpBridge;
//!
//! # async fn example(servers: Vec<McpServerConfig>, env: EnvMap) {
//! let bridge = McpBridge::connect(&servers, &env).await.unwrap();
//! let tools = bridge.tools();
//! // ... register `tools` and run the skill ...
//! bridge.close().await;
//! # }
//! ```

pub mod bridge;
pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use bridge::{resolve_headers, McpBridge};
pub use client::{McpSession, McpTool, DEFAULT_REQUEST_TIMEOUT};
pub use error::McpError;
pub use transport::{ChannelTransport, McpTransport, SseTransport, StreamableHttpTransport};
pub use types::*;
