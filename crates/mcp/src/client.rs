//! MCP client session.
//!
//! Runs the handshake over any [`McpTransport`], discovers tools, and
//! provides an adapter that implements the `Tool` trait for each remote tool.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use telos_tool_runtime::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::*;

/// Default deadline for one request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// An initialized session with one remote tool server.
///
/// Requests are serialized through the transport lock, so concurrent tool
/// calls on the same server queue behind each other.
pub struct McpSession {
    server: String,
    transport: Mutex<Box<dyn McpTransport>>,
    next_id: AtomicI64,
    request_timeout: Duration,
    server_info: Option<ServerInfo>,
    tools: Vec<ToolInfo>,
}

impl McpSession {
    /// Perform the MCP handshake over `transport` and list the server's tools.
    pub async fn start(
        server: impl Into<String>,
        transport: Box<dyn McpTransport>,
        request_timeout: Duration,
    ) -> Result<Self, McpError> {
        let mut session = Self {
            server: server.into(),
            transport: Mutex::new(transport),
            next_id: AtomicI64::new(1),
            request_timeout,
            server_info: None,
            tools: Vec::new(),
        };

        session.initialize().await?;
        session.discover_tools().await?;
        Ok(session)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn tools(&self) -> &[ToolInfo] {
        &self.tools
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|info| info.to_definition(&self.server))
            .collect()
    }

    /// Send a JSON-RPC request and wait for the response with the same id.
    ///
    /// Server-initiated messages and stale responses seen in between are
    /// skipped.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = RpcId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = JsonRpcRequest::new(id.clone(), method, params);
        let json = serde_json::to_string(&request)?;

        tracing::debug!(server = %self.server, method = %method, id = %id, "Sending request");

        let mut transport = self.transport.lock().await;

        // Streamable HTTP does the whole exchange inside `send`, so the
        // deadline covers it as well as the wait for the reply.
        let exchange = async {
            transport.send(&json).await?;
            loop {
                let raw = transport.receive().await?.ok_or(McpError::Closed)?;
                match IncomingMessage::parse(&raw)? {
                    IncomingMessage::Response(resp) if resp.id == id => {
                        return Ok::<_, McpError>(resp);
                    }
                    IncomingMessage::Response(resp) => {
                        tracing::debug!(id = %resp.id, "Skipping response for another request");
                    }
                    IncomingMessage::ServerMessage { method } => {
                        tracing::debug!(method = %method, "Ignoring server message");
                    }
                }
            }
        };
        let response: JsonRpcResponse = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| McpError::Timeout(self.request_timeout))??;

        if let Some(err) = response.error {
            return Err(McpError::Remote {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| McpError::Protocol(format!("'{method}' response has no result")))
    }

    /// Send a JSON-RPC notification (no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notif = JsonRpcNotification::new(method, params);
        let json = serde_json::to_string(&notif)?;
        self.transport.lock().await.send(&json).await
    }

    async fn initialize(&mut self) -> Result<(), McpError> {
        let params = serde_json::to_value(InitializeParams::telos())?;
        let result: InitializeResult =
            serde_json::from_value(self.request("initialize", Some(params)).await?)?;

        self.notify("notifications/initialized", None).await?;

        tracing::debug!(
            server = %self.server,
            protocol = %result.protocol_version,
            "MCP session initialized"
        );
        self.server_info = result.server_info;
        Ok(())
    }

    /// Follow `nextCursor` until every page has been read.
    async fn discover_tools(&mut self) -> Result<(), McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = serde_json::to_value(ListToolsParams {
                cursor: cursor.take(),
            })?;
            let page: ListToolsResult =
                serde_json::from_value(self.request("tools/list", Some(params)).await?)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        for tool in &tools {
            tracing::trace!(server = %self.server, name = %tool.name, "Discovered tool");
        }
        self.tools = tools;
        Ok(())
    }

    /// Call a tool on the remote server.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Close the underlying transport.
    pub async fn close(&self) {
        tracing::debug!(server = %self.server, "Closing MCP session");
        self.transport.lock().await.close().await;
    }
}

/// A remote tool adapter that implements the `Tool` trait.
///
/// The definition carries `ToolOrigin::Mcp(server)`.
pub struct McpTool {
    info: ToolInfo,
    session: Arc<McpSession>,
}

impl McpTool {
    pub fn new(info: ToolInfo, session: Arc<McpSession>) -> Self {
        Self { info, session }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn definition(&self) -> ToolDefinition {
        self.info.to_definition(self.session.server())
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let result = self
            .session
            .call_tool(&self.info.name, input)
            .await
            .map_err(|e| ToolError::Remote(e.to_string()))?;

        Ok(result.into())
    }
}

impl From<CallToolResult> for ToolResult {
    fn from(result: CallToolResult) -> Self {
        let text = result.text();
        if result.is_error {
            ToolResult::error(text)
        } else {
            ToolResult::success(text)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use serde_json::json;

    /// Answers the client side of a channel pair like a small MCP server
    /// exposing `tools`. `tools/call` echoes the arguments back as text; a
    /// tool named `explode` returns a JSON-RPC error.
    pub(crate) fn spawn_fake_server(mut transport: ChannelTransport, tools: Vec<&'static str>) {
        tokio::spawn(async move {
            while let Ok(Some(raw)) = transport.receive().await {
                let msg: Value = serde_json::from_str(&raw).unwrap();
                let Some(id) = msg.get("id").cloned() else {
                    continue;
                };
                let result = match msg["method"].as_str().unwrap_or_default() {
                    "initialize" => json!({
                        "protocolVersion": PROTOCOL_VERSION,
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "fake", "version": "0.0.1"}
                    }),
                    "tools/list" => json!({
                        "tools": tools
                            .iter()
                            .map(|name| json!({
                                "name": name,
                                "description": format!("{name} tool"),
                                "inputSchema": {"type": "object"}
                            }))
                            .collect::<Vec<_>>()
                    }),
                    "tools/call" if msg["params"]["name"] == "explode" => {
                        let reply = json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {"code": -32000, "message": "kaboom"}
                        });
                        transport.send(&reply.to_string()).await.unwrap();
                        continue;
                    }
                    "tools/call" => json!({
                        "content": [{"type": "text", "text": msg["params"]["arguments"].to_string()}]
                    }),
                    _ => json!({}),
                };
                let reply = json!({"jsonrpc": "2.0", "id": id, "result": result});
                if transport.send(&reply.to_string()).await.is_err() {
                    break;
                }
            }
        });
    }

    pub(crate) async fn fake_session(server: &str, tools: Vec<&'static str>) -> McpSession {
        let (client, server_end) = ChannelTransport::pair();
        spawn_fake_server(server_end, tools);
        McpSession::start(server, Box::new(client), Duration::from_secs(5))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_handshake_and_discovery() {
        let session = fake_session("docs", vec!["search", "fetch_page"]).await;
        assert_eq!(session.server_info().unwrap().name, "fake");
        let names: Vec<_> = session.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["search", "fetch_page"]);

        let defs = session.tool_definitions();
        assert_eq!(defs[0].origin.to_string(), "mcp:docs");
        assert_eq!(defs[0].description, "search tool");
    }

    #[tokio::test]
    async fn test_handshake_message_order() {
        let (client, mut server_end) = ChannelTransport::pair();
        let start = tokio::spawn(McpSession::start(
            "s",
            Box::new(client),
            Duration::from_secs(5),
        ));

        let init: Value = serde_json::from_str(&server_end.receive().await.unwrap().unwrap()).unwrap();
        assert_eq!(init["method"], "initialize");
        assert_eq!(init["params"]["clientInfo"]["name"], "telos");
        // A server ping before the reply must not confuse the client.
        server_end
            .send(r#"{"jsonrpc":"2.0","id":"srv-1","method":"ping"}"#)
            .await
            .unwrap();
        server_end
            .send(&json!({"jsonrpc": "2.0", "id": init["id"], "result": {"protocolVersion": PROTOCOL_VERSION}}).to_string())
            .await
            .unwrap();

        let initialized: Value =
            serde_json::from_str(&server_end.receive().await.unwrap().unwrap()).unwrap();
        assert_eq!(initialized["method"], "notifications/initialized");
        assert!(initialized.get("id").is_none());

        let list: Value = serde_json::from_str(&server_end.receive().await.unwrap().unwrap()).unwrap();
        assert_eq!(list["method"], "tools/list");
        server_end
            .send(&json!({"jsonrpc": "2.0", "id": list["id"], "result": {"tools": [], "nextCursor": "p2"}}).to_string())
            .await
            .unwrap();

        let page2: Value = serde_json::from_str(&server_end.receive().await.unwrap().unwrap()).unwrap();
        assert_eq!(page2["params"]["cursor"], "p2");
        server_end
            .send(&json!({"jsonrpc": "2.0", "id": page2["id"], "result": {"tools": [{"name": "late"}]}}).to_string())
            .await
            .unwrap();

        let session = start.await.unwrap().unwrap();
        assert_eq!(session.tools().len(), 1);
        assert_eq!(session.tools()[0].name, "late");
    }

    #[tokio::test]
    async fn test_call_tool_and_remote_error() {
        let session = Arc::new(fake_session("docs", vec!["search", "explode"]).await);

        let result = session.call_tool("search", json!({"q": "rust"})).await.unwrap();
        assert_eq!(result.text(), r#"{"q":"rust"}"#);

        match session.call_tool("explode", json!({})).await {
            Err(McpError::Remote { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "kaboom");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mcp_tool_adapter() {
        let session = Arc::new(fake_session("docs", vec!["search", "explode"]).await);
        let ctx = ToolContext::new("/tmp");

        let search = McpTool::new(session.tools()[0].clone(), session.clone());
        assert_eq!(search.definition().origin.to_string(), "mcp:docs");
        let result = search.execute(json!({"q": 1}), &ctx).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, r#"{"q":1}"#);

        let explode = McpTool::new(session.tools()[1].clone(), session);
        let err = explode.execute(json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::Remote(ref m) if m.contains("kaboom")));
    }

    #[tokio::test]
    async fn test_closed_transport() {
        let (client, server_end) = ChannelTransport::pair();
        drop(server_end);
        let err = McpSession::start("gone", Box::new(client), Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout() {
        let (client, _server_end) = ChannelTransport::pair();
        let err = McpSession::start("mute", Box::new(client), Duration::from_secs(3))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::Timeout(_)));
    }
}
