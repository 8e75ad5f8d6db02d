//! Connection set and namespaced dispatch

use super::{namespace, split_namespaced, Launcher, McpError, RemoteTool, ServerSpec, ToolConnection, SEPARATOR};
use crate::history::{flatten_text, ResultItem};
use crate::llm::ToolDescriptor;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Ceiling on a single `tools/list`
pub const LIST_TOOLS_TIMEOUT: Duration = Duration::from_secs(10);

/// Process-wide set of tool-server connections.
///
/// The set only changes during startup registration and shutdown; in steady
/// state it is read concurrently by every prompt resolution.
pub struct McpRegistry {
    launcher: Arc<dyn Launcher>,
    connections: RwLock<HashMap<String, Arc<dyn ToolConnection>>>,
    call_timeout: Duration,
}

impl McpRegistry {
    pub fn new(launcher: Arc<dyn Launcher>, call_timeout: Duration) -> Self {
        Self {
            launcher,
            connections: RwLock::new(HashMap::new()),
            call_timeout,
        }
    }

    /// Launch one server and add it to the set
    pub async fn register(&self, server_id: &str, spec: &ServerSpec) -> Result<(), McpError> {
        let invalid = |reason| McpError::InvalidServerId {
            id: server_id.to_string(),
            reason,
        };
        if server_id.is_empty() {
            return Err(invalid("empty"));
        }
        if server_id.contains(SEPARATOR) {
            return Err(invalid("contains the namespace separator"));
        }
        if self.connections.read().await.contains_key(server_id) {
            return Err(invalid("already registered"));
        }

        let connection = self.launcher.launch(server_id, spec).await?;
        self.connections
            .write()
            .await
            .insert(server_id.to_string(), connection);
        Ok(())
    }

    /// Register every server, all or nothing.
    ///
    /// On the first failure every connection opened by this call is closed
    /// and the error returned, leaving the set as it was before.
    pub async fn register_all(&self, servers: &BTreeMap<String, ServerSpec>) -> Result<usize, McpError> {
        let mut registered = Vec::with_capacity(servers.len());

        for (server_id, spec) in servers {
            if let Err(e) = self.register(server_id, spec).await {
                tracing::error!(server = %server_id, error = %e, "Server registration failed, rolling back");
                let rolled_back: Vec<_> = {
                    let mut connections = self.connections.write().await;
                    registered
                        .iter()
                        .filter_map(|id: &String| connections.remove(id).map(|c| (id.clone(), c)))
                        .collect()
                };
                close_all(rolled_back).await;
                return Err(e);
            }
            registered.push(server_id.clone());
        }

        Ok(registered.len())
    }

    /// Tools advertised by one server, bounded by [`LIST_TOOLS_TIMEOUT`]
    pub async fn list_tools(&self, server_id: &str) -> Result<Vec<RemoteTool>, McpError> {
        let connection = self.connection(server_id).await?;
        tokio::time::timeout(LIST_TOOLS_TIMEOUT, connection.list_tools())
            .await
            .map_err(|_| McpError::ListTimeout {
                server: server_id.to_string(),
                timeout: LIST_TOOLS_TIMEOUT,
            })?
    }

    /// Namespaced catalog across all servers, ordered by server id.
    ///
    /// A server that fails to list its tools contributes nothing; the others
    /// are unaffected.
    pub async fn catalog(&self) -> Vec<ToolDescriptor> {
        let mut catalog = Vec::new();

        for server_id in self.server_ids().await {
            match self.list_tools(&server_id).await {
                Ok(tools) => {
                    tracing::info!(server = %server_id, count = tools.len(), "Tools loaded");
                    catalog.extend(tools.into_iter().map(|tool| ToolDescriptor {
                        name: namespace(&server_id, &tool.name),
                        description: tool.description,
                        input_schema: tool.input_schema,
                    }));
                }
                Err(e) => {
                    tracing::error!(server = %server_id, error = %e, "Failed to list tools");
                }
            }
        }

        catalog
    }

    /// Route a namespaced call to its server.
    ///
    /// A result the server flags as an error comes back as
    /// [`McpError::ToolFailed`].
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Vec<ResultItem>, McpError> {
        let (server_id, local) = split_namespaced(name)?;
        let connection = self.connection(server_id).await?;

        let arguments = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(McpError::InvalidArguments {
                    tool: name.to_string(),
                    message: format!("expected a JSON object, got {other}"),
                })
            }
        };

        let result = tokio::time::timeout(self.call_timeout, connection.call_tool(local, arguments))
            .await
            .map_err(|_| McpError::CallTimeout {
                tool: name.to_string(),
                timeout: self.call_timeout,
            })??;

        if result.is_error {
            return Err(McpError::ToolFailed {
                tool: name.to_string(),
                message: flatten_text(&result.content),
            });
        }
        Ok(result.content)
    }

    /// Close every connection. Safe to call more than once.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.connections.write().await.drain().collect();
        if drained.is_empty() {
            return;
        }
        tracing::info!(count = drained.len(), "Closing tool servers");
        close_all(drained).await;
    }

    pub async fn server_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.connections.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Clone the handle out so the lock is not held across the call
    async fn connection(&self, server_id: &str) -> Result<Arc<dyn ToolConnection>, McpError> {
        self.connections
            .read()
            .await
            .get(server_id)
            .cloned()
            .ok_or_else(|| McpError::ServerNotFound(server_id.to_string()))
    }
}

async fn close_all(connections: Vec<(String, Arc<dyn ToolConnection>)>) {
    for (server_id, connection) in connections {
        if let Err(e) = connection.close().await {
            tracing::warn!(server = %server_id, error = %e, "Failed to close connection");
        }
    }
}
