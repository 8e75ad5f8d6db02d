//! Mock implementations for testing
//!
//! These mocks enable testing the runtime, the registry and the HTTP layer
//! without model providers or tool-server processes.

use super::traits::ToolExecutor;
use crate::history::ResultItem;
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService, ToolDescriptor};
use crate::mcp::{split_namespaced, Launcher, McpError, RemoteTool, ServerSpec, ToolConnection, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock model backend that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Record of all requests made
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn create_message(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

/// Mock executor with scripted results keyed by namespaced name.
///
/// Routing follows the registry: malformed names and names whose server has
/// no scripted tool fail with the same errors.
pub struct MockToolExecutor {
    outputs: BTreeMap<String, Result<Vec<ResultItem>, String>>,
    /// Record of tool invocations
    invocations: Mutex<Vec<(String, Value)>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            outputs: BTreeMap::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Add a tool that succeeds with `items`
    pub fn with_tool(mut self, name: &str, items: Vec<ResultItem>) -> Self {
        self.outputs.insert(name.to_string(), Ok(items));
        self
    }

    /// Add a tool that reports an execution failure
    pub fn with_failure(mut self, name: &str, message: &str) -> Self {
        self.outputs.insert(name.to_string(), Err(message.to_string()));
        self
    }

    /// Descriptors for every scripted tool
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        self.outputs
            .keys()
            .map(|name| ToolDescriptor {
                name: name.clone(),
                description: format!("Mock {name}"),
                input_schema: json!({"type": "object", "properties": {}}),
            })
            .collect()
    }

    /// Get recorded invocations
    pub fn recorded_invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn invoke(&self, name: &str, arguments: Value) -> Result<Vec<ResultItem>, McpError> {
        self.invocations
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));

        let (server, _) = split_namespaced(name)?;
        match self.outputs.get(name) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(message)) => Err(McpError::ToolFailed {
                tool: name.to_string(),
                message: message.clone(),
            }),
            None => Err(McpError::ServerNotFound(server.to_string())),
        }
    }
}

// ============================================================================
// Fake Launcher (in-memory tool servers)
// ============================================================================

#[derive(Default)]
struct FakeState {
    launched: Vec<String>,
    closed: Vec<String>,
    /// (server, local tool, arguments)
    calls: Vec<(String, String, Value)>,
}

/// Launcher whose servers live in memory.
///
/// Each server answers a call with a single text item `"<server>:<tool>"`.
#[derive(Default)]
pub struct FakeLauncher {
    servers: HashMap<String, Vec<String>>,
    failing_handshake: HashSet<String>,
    failing_list: HashSet<String>,
    hanging_list: HashSet<String>,
    failing_tools: HashSet<(String, String)>,
    hanging_tools: HashSet<(String, String)>,
    state: Arc<Mutex<FakeState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, id: &str, tools: &[&str]) -> Self {
        self.servers
            .insert(id.to_string(), tools.iter().map(|t| (*t).to_string()).collect());
        self
    }

    pub fn failing_handshake(mut self, id: &str) -> Self {
        self.failing_handshake.insert(id.to_string());
        self
    }

    pub fn failing_list(mut self, id: &str) -> Self {
        self.failing_list.insert(id.to_string());
        self
    }

    /// `tools/list` never answers
    pub fn hanging_list(mut self, id: &str) -> Self {
        self.hanging_list.insert(id.to_string());
        self
    }

    /// The tool answers with `isError` set
    pub fn failing_tool(mut self, id: &str, tool: &str) -> Self {
        self.failing_tools.insert((id.to_string(), tool.to_string()));
        self
    }

    /// The tool never answers
    pub fn hanging_tool(mut self, id: &str, tool: &str) -> Self {
        self.hanging_tools.insert((id.to_string(), tool.to_string()));
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.state.lock().unwrap().launched.clone()
    }

    pub fn closed(&self) -> Vec<String> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.state.lock().unwrap().calls.clone()
    }

    fn tool_set(set: &HashSet<(String, String)>, id: &str) -> HashSet<String> {
        set.iter()
            .filter(|(server, _)| server == id)
            .map(|(_, tool)| tool.clone())
            .collect()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, server_id: &str, _spec: &ServerSpec) -> Result<Arc<dyn ToolConnection>, McpError> {
        self.state.lock().unwrap().launched.push(server_id.to_string());

        if self.failing_handshake.contains(server_id) {
            return Err(McpError::Handshake {
                server: server_id.to_string(),
                message: "connection closed: initialize".to_string(),
            });
        }
        let tools = self.servers.get(server_id).cloned().ok_or_else(|| McpError::Spawn {
            server: server_id.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such fake server"),
        })?;

        Ok(Arc::new(FakeConnection {
            server_id: server_id.to_string(),
            tools,
            failing_list: self.failing_list.contains(server_id),
            hanging_list: self.hanging_list.contains(server_id),
            failing_tools: Self::tool_set(&self.failing_tools, server_id),
            hanging_tools: Self::tool_set(&self.hanging_tools, server_id),
            state: self.state.clone(),
        }))
    }
}

struct FakeConnection {
    server_id: String,
    tools: Vec<String>,
    failing_list: bool,
    hanging_list: bool,
    failing_tools: HashSet<String>,
    hanging_tools: HashSet<String>,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl ToolConnection for FakeConnection {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, McpError> {
        if self.hanging_list {
            std::future::pending::<()>().await;
        }
        if self.failing_list {
            return Err(McpError::Protocol {
                server: self.server_id.clone(),
                message: "tools/list failed".to_string(),
            });
        }
        Ok(self
            .tools
            .iter()
            .map(|name| RemoteTool {
                name: name.clone(),
                description: format!("{name} on {}", self.server_id),
                input_schema: json!({"type": "object"}),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolResult, McpError> {
        self.state.lock().unwrap().calls.push((
            self.server_id.clone(),
            name.to_string(),
            Value::Object(arguments),
        ));

        if self.hanging_tools.contains(name) {
            std::future::pending::<()>().await;
        }
        if self.failing_tools.contains(name) {
            return Ok(ToolResult {
                content: vec![ResultItem::text(format!("{name} failed"))],
                is_error: true,
            });
        }
        Ok(ToolResult {
            content: vec![ResultItem::text(format!("{}:{name}", self.server_id))],
            is_error: false,
        })
    }

    async fn close(&self) -> Result<(), McpError> {
        self.state.lock().unwrap().closed.push(self.server_id.clone());
        Ok(())
    }
}
