//! Error types for the MCP crate.

/// Errors that can occur during MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Failed to parse or encode JSON.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The HTTP exchange itself failed (connect, TLS, reset).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// The server broke the protocol (missing result, bad endpoint, ...).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server returned a JSON-RPC error object.
    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// A header placeholder referenced an unset variable.
    #[error("server '{server}': {detail}")]
    MissingCredential { server: String, detail: String },

    /// A configured header name or value is not valid HTTP.
    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    /// No reply within the request deadline.
    #[error("Timed out after {0:?} waiting for a reply")]
    Timeout(std::time::Duration),

    /// The transport closed before a reply arrived.
    #[error("Connection closed")]
    Closed,
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        McpError::Transport(err.to_string())
    }
}

impl McpError {
    /// True when a header placeholder could not be resolved.
    pub fn is_credential(&self) -> bool {
        matches!(self, McpError::MissingCredential { .. })
    }
}
