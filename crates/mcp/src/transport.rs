//! MCP transport layer.
//!
//! Defines the `McpTransport` trait for sending/receiving JSON-RPC messages
//! and the two HTTP transports remote tool servers speak:
//!
//! - [`StreamableHttpTransport`]: every message is a `POST`; the reply comes
//!   back in the response body as JSON or as a short SSE stream.
//! - [`SseTransport`]: the legacy pairing of a long-lived `GET` event stream
//!   (whose first `endpoint` event names the POST URL) with fire-and-forget
//!   `POST`s.

use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::McpError;
use crate::types::IncomingMessage;

const SESSION_HEADER: &str = "mcp-session-id";
const EVENT_STREAM_MIME: &str = "text/event-stream";
const JSON_MIME: &str = "application/json";

/// Trait for MCP message transport.
///
/// Messages are serialized JSON-RPC objects. `receive` yields whatever the
/// server sent next, in order.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Read the next JSON-RPC message from the transport.
    /// Returns `None` when nothing more will arrive.
    async fn receive(&mut self) -> Result<Option<String>, McpError>;

    /// Write a JSON-RPC message to the transport.
    async fn send(&mut self, message: &str) -> Result<(), McpError>;

    /// Release the connection. Errors are logged, never returned.
    async fn close(&mut self) {}
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, McpError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| McpError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| McpError::InvalidHeader(name.clone()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, McpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(McpError::HttpStatus {
        status: status.as_u16(),
        url,
        body,
    })
}

fn stream_error(err: EventStreamError<reqwest::Error>) -> McpError {
    match err {
        EventStreamError::Transport(e) => McpError::Transport(e.to_string()),
        other => McpError::Protocol(other.to_string()),
    }
}

fn is_response(data: &str) -> bool {
    matches!(IncomingMessage::parse(data), Ok(IncomingMessage::Response(_)))
}

// ── Streamable HTTP ─────────────────────────────────────────────────

/// Streamable HTTP transport.
///
/// Replies to a POST are queued and handed out by `receive`. The session id
/// assigned by the server on `initialize` is echoed on every later request.
pub struct StreamableHttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    session_id: Option<String>,
    inbox: VecDeque<String>,
}

impl StreamableHttpTransport {
    pub fn new(url: impl Into<String>, headers: &BTreeMap<String, String>) -> Result<Self, McpError> {
        Ok(Self {
            client: reqwest::Client::new(),
            url: url.into(),
            headers: header_map(headers)?,
            session_id: None,
            inbox: VecDeque::new(),
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    async fn read_event_stream(&mut self, response: reqwest::Response) -> Result<(), McpError> {
        let mut events = Box::pin(response.bytes_stream().eventsource());
        while let Some(event) = events.next().await {
            let event = event.map_err(stream_error)?;
            if event.data.trim().is_empty() {
                continue;
            }
            let done = is_response(&event.data);
            self.inbox.push_back(event.data);
            // The stream may stay open for server-initiated messages.
            if done {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        Ok(self.inbox.pop_front())
    }

    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        let mut request = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, format!("{JSON_MIME}, {EVENT_STREAM_MIME}"))
            .header(CONTENT_TYPE, JSON_MIME)
            .body(message.to_string());
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = check_status(request.send().await?).await?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if self.session_id.as_deref() != Some(session_id) {
                debug!(session_id, "MCP session assigned");
                self.session_id = Some(session_id.to_string());
            }
        }

        if matches!(response.status(), StatusCode::ACCEPTED | StatusCode::NO_CONTENT) {
            return Ok(());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with(EVENT_STREAM_MIME) {
            return self.read_event_stream(response).await;
        }

        // JSON, or a missing content type with a JSON body.
        let body = response.text().await?;
        if !body.trim().is_empty() {
            self.inbox.push_back(body);
        }
        Ok(())
    }

    async fn close(&mut self) {
        let Some(session_id) = self.session_id.take() else {
            return;
        };
        let result = self
            .client
            .delete(&self.url)
            .headers(self.headers.clone())
            .header(SESSION_HEADER, &session_id)
            .send()
            .await;
        match result {
            // 405 means the server does not support explicit termination.
            Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::METHOD_NOT_ALLOWED => {}
            Ok(resp) => debug!(status = %resp.status(), "MCP session delete rejected"),
            Err(e) => debug!(error = %e, "MCP session delete failed"),
        }
    }
}

// ── Legacy SSE ──────────────────────────────────────────────────────

type RawEvents = Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

/// Legacy SSE transport.
///
/// A background task forwards `message` events from the GET stream into a
/// channel; the task is aborted on `close` or drop.
pub struct SseTransport {
    client: reqwest::Client,
    headers: HeaderMap,
    endpoint: String,
    rx: mpsc::Receiver<String>,
    reader: JoinHandle<()>,
}

impl SseTransport {
    /// Open the event stream and wait up to `timeout` for the `endpoint` event.
    pub async fn connect(
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        let client = reqwest::Client::new();
        let headers = header_map(headers)?;

        let response = client
            .get(url)
            .headers(headers.clone())
            .header(ACCEPT, EVENT_STREAM_MIME)
            .send()
            .await?;
        let response = check_status(response).await?;
        let mut events: RawEvents = Box::pin(response.bytes_stream().eventsource());

        let endpoint = tokio::time::timeout(timeout, wait_for_endpoint(&mut events))
            .await
            .map_err(|_| McpError::Timeout(timeout))??;
        let endpoint = url::Url::parse(url)
            .and_then(|base| base.join(&endpoint))
            .map_err(|e| McpError::Protocol(format!("bad endpoint '{endpoint}': {e}")))?
            .to_string();
        debug!(endpoint = %endpoint, "SSE endpoint received");

        let (tx, rx) = mpsc::channel(32);
        let reader = tokio::spawn(forward_messages(events, tx));

        Ok(Self {
            client,
            headers,
            endpoint,
            rx,
            reader,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

async fn wait_for_endpoint(events: &mut RawEvents) -> Result<String, McpError> {
    while let Some(event) = events.next().await {
        let event = event.map_err(stream_error)?;
        if event.event == "endpoint" {
            return Ok(event.data.trim().to_string());
        }
        trace!(event = %event.event, "ignoring event before endpoint");
    }
    Err(McpError::Closed)
}

async fn forward_messages(mut events: RawEvents, tx: mpsc::Sender<String>) {
    while let Some(event) = events.next().await {
        match event {
            Ok(event) if event.event == "message" => {
                if tx.send(event.data).await.is_err() {
                    break;
                }
            }
            Ok(event) => trace!(event = %event.event, "ignoring SSE event"),
            Err(e) => {
                warn!(error = %e, "MCP event stream failed");
                break;
            }
        }
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        Ok(self.rx.recv().await)
    }

    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, JSON_MIME)
            .body(message.to_string())
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn close(&mut self) {
        self.reader.abort();
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

// ── In-memory ───────────────────────────────────────────────────────

/// In-memory transport backed by channel pairs.
pub struct ChannelTransport {
    rx: mpsc::Receiver<String>,
    tx: mpsc::Sender<String>,
}

impl ChannelTransport {
    /// Create a pair of connected transports.
    ///
    /// Messages sent on one transport are received by the other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel(32);
        let (tx_b, rx_a) = mpsc::channel(32);
        (
            Self { rx: rx_a, tx: tx_a },
            Self { rx: rx_b, tx: tx_b },
        )
    }
}

#[async_trait]
impl McpTransport for ChannelTransport {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        Ok(self.rx.recv().await)
    }

    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        self.tx
            .send(message.to_string())
            .await
            .map_err(|_| McpError::Closed)
    }
}
