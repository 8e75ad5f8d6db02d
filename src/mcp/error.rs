use std::time::Duration;
use thiserror::Error;

/// Tool-server registry errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("invalid server id {id:?}: {reason}")]
    InvalidServerId { id: String, reason: &'static str },

    #[error("failed to start server {server}: {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize server {server}: {message}")]
    Handshake { server: String, message: String },

    #[error("server {server} did not finish initializing within {}s", timeout.as_secs())]
    HandshakeTimeout { server: String, timeout: Duration },

    #[error("server {server} did not list its tools within {}s", timeout.as_secs())]
    ListTimeout { server: String, timeout: Duration },

    #[error("tool {tool} timed out after {}s", timeout.as_secs())]
    CallTimeout { tool: String, timeout: Duration },

    #[error("invalid tool name format: {0}")]
    MalformedName(String),

    #[error("server not found: {0}")]
    ServerNotFound(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("{message}")]
    ToolFailed { tool: String, message: String },

    #[error("protocol error from {server}: {message}")]
    Protocol { server: String, message: String },
}

impl McpError {
    /// The call could not be routed to any server. These are skipped with a
    /// warning rather than reported back to the model.
    pub fn is_routing(&self) -> bool {
        matches!(self, McpError::MalformedName(_) | McpError::ServerNotFound(_))
    }
}
