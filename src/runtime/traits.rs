//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::history::ResultItem;
use crate::mcp::{McpError, McpRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Executor for namespaced tool calls
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Invoke `name` (`server::tool`) with `arguments`
    async fn invoke(&self, name: &str, arguments: Value) -> Result<Vec<ResultItem>, McpError>;
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn invoke(&self, name: &str, arguments: Value) -> Result<Vec<ResultItem>, McpError> {
        (**self).invoke(name, arguments).await
    }
}

#[async_trait]
impl ToolExecutor for McpRegistry {
    async fn invoke(&self, name: &str, arguments: Value) -> Result<Vec<ResultItem>, McpError> {
        McpRegistry::invoke(self, name, arguments).await
    }
}
