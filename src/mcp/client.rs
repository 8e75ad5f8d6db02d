//! MCP client over stdio using the rmcp SDK

use super::{McpError, RemoteTool, ServerSpec, ToolResult};
use crate::history::ResultItem;
use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation, Tool},
    service::{Peer, RunningService},
    transport::{ConfigureCommandExt, TokioChildProcess},
    RoleClient, ServiceExt,
};
use serde_json::{Map, Value};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Ceiling on process start plus `initialize`
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(120);

/// A live connection to one tool server
#[async_trait]
pub trait ToolConnection: Send + Sync {
    /// Tools the server advertises, under their local names
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, McpError>;

    /// Call a tool by its local name
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolResult, McpError>;

    /// Terminate the session. Closing twice is a no-op.
    async fn close(&self) -> Result<(), McpError>;
}

/// Starts tool servers and completes the handshake
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, server_id: &str, spec: &ServerSpec) -> Result<Arc<dyn ToolConnection>, McpError>;
}

/// Name and version this process reports in `initialize`
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
}

/// Launches servers as child processes speaking MCP on stdin/stdout
pub struct StdioLauncher {
    identity: ClientIdentity,
    handshake_timeout: Duration,
}

impl StdioLauncher {
    pub fn new(identity: ClientIdentity) -> Self {
        Self {
            identity,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    fn client_info(&self) -> ClientInfo {
        ClientInfo {
            meta: None,
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: self.identity.name.clone(),
                title: None,
                version: self.identity.version.clone(),
                website_url: None,
                icons: None,
            },
        }
    }
}

#[async_trait]
impl Launcher for StdioLauncher {
    async fn launch(&self, server_id: &str, spec: &ServerSpec) -> Result<Arc<dyn ToolConnection>, McpError> {
        tracing::info!(server = %server_id, command = %spec.command, "Initializing server");

        let transport = TokioChildProcess::new(tokio::process::Command::new(&spec.command).configure(|cmd| {
            cmd.args(&spec.args)
                .envs(&spec.env)
                .stderr(Stdio::inherit())
                .kill_on_drop(true);
        }))
        .map_err(|source| McpError::Spawn {
            server: server_id.to_string(),
            source,
        })?;

        // Dropping the transport on timeout kills the child
        let service = tokio::time::timeout(self.handshake_timeout, self.client_info().serve(transport))
            .await
            .map_err(|_| McpError::HandshakeTimeout {
                server: server_id.to_string(),
                timeout: self.handshake_timeout,
            })?
            .map_err(|e| McpError::Handshake {
                server: server_id.to_string(),
                message: e.to_string(),
            })?;

        if let Some(info) = service.peer_info() {
            tracing::info!(
                server = %server_id,
                remote_name = %info.server_info.name,
                remote_version = %info.server_info.version,
                "Server initialized"
            );
        }

        Ok(Arc::new(StdioConnection {
            server_id: server_id.to_string(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        }))
    }
}

/// One running stdio server.
///
/// Calls go through a cloned [`Peer`], which multiplexes requests, so
/// concurrent calls never wait on each other. The service handle is only
/// needed to shut the session down.
struct StdioConnection {
    server_id: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
}

impl StdioConnection {
    fn protocol_error(&self, e: impl std::fmt::Display) -> McpError {
        McpError::Protocol {
            server: self.server_id.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ToolConnection for StdioConnection {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, McpError> {
        let result = self
            .peer
            .list_tools(Default::default())
            .await
            .map_err(|e| self.protocol_error(e))?;
        Ok(result.tools.into_iter().map(remote_tool).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolResult, McpError> {
        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: Some(arguments),
            task: None,
        };
        let result = self
            .peer
            .call_tool(params)
            .await
            .map_err(|e| self.protocol_error(e))?;
        Ok(tool_result(result))
    }

    async fn close(&self) -> Result<(), McpError> {
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };
        service.cancel().await.map_err(|e| self.protocol_error(e))?;
        tracing::debug!(server = %self.server_id, "Connection closed");
        Ok(())
    }
}

fn remote_tool(tool: Tool) -> RemoteTool {
    RemoteTool {
        name: tool.name.to_string(),
        description: tool.description.map(|s| s.to_string()).unwrap_or_default(),
        input_schema: Value::Object(tool.input_schema.as_ref().clone()),
    }
}

/// Convert content item by item through its JSON form so unknown content
/// kinds keep every field.
fn tool_result(result: CallToolResult) -> ToolResult {
    let mut content: Vec<ResultItem> = result
        .content
        .iter()
        .filter_map(|item| match serde_json::to_value(item) {
            Ok(value) => Some(ResultItem::from_value(value)),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unserializable tool result item");
                None
            }
        })
        .collect();

    if content.is_empty() {
        if let Some(structured) = result.structured_content {
            content.push(ResultItem::text(structured.to_string()));
        }
    }

    ToolResult {
        content,
        is_error: result.is_error.unwrap_or(false),
    }
}
