//! Tool-server registry
//!
//! Each configured MCP server runs as a child process. Its tools are exposed
//! to the model under `<server>::<tool>` so independently written servers can
//! ship tools with the same local name.

mod client;
mod config;
mod error;
#[cfg(test)]
mod proptests;
mod registry;

pub use client::{ClientIdentity, Launcher, StdioLauncher, ToolConnection};
pub use config::{McpConfig, ServerSpec};
pub use error::McpError;
pub use registry::McpRegistry;

use crate::history::ResultItem;
use serde_json::Value;

/// Separator between server id and local tool name
pub const SEPARATOR: &str = "::";

/// Build the catalog name for `local` on `server_id`
pub fn namespace(server_id: &str, local: &str) -> String {
    format!("{server_id}{SEPARATOR}{local}")
}

/// Split a namespaced name into `(server_id, local_name)`.
///
/// The name must contain the separator exactly once and the local part must
/// be non-empty. An empty server id splits fine and fails later as an unknown
/// server.
pub fn split_namespaced(name: &str) -> Result<(&str, &str), McpError> {
    let mut parts = name.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(server), Some(local), None) if !local.is_empty() => Ok((server, local)),
        _ => Err(McpError::MalformedName(name.to_string())),
    }
}

/// Tool as advertised by a server, under its local name
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Raw result of one `tools/call`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ResultItem>,
    /// The server flagged the call as failed
    pub is_error: bool,
}
