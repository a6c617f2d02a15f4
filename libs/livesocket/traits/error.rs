use thiserror::Error;

/// Main error type for livesocket
///
/// Every variant carries owned strings so the error can be cloned into
/// observable state (`last_error`, adapter `error`) without sharing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiveSocketError {
    /// WebSocket transport error (DNS, handshake, I/O)
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed by the peer or the stream ended
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Frame could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Inbound envelope is missing its `type` tag or is otherwise unusable
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Operation requires a live session
    #[error("Not connected")]
    NotConnected,

    /// Internal channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No tokio runtime available to drive the session task
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Result type for livesocket operations
pub type Result<T> = std::result::Result<T, LiveSocketError>;
