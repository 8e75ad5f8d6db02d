//! Ollama chat backend (`/api/chat`, non-streaming)

use super::types::{LlmRequest, LlmResponse, ToolCall, ToolNameMap, Usage};
use super::{LlmError, LlmService};
use crate::config::ConfigError;
use crate::history::{ContentBlock, Role, Turn};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_HOST: &str = "http://localhost:11434";

/// Local Ollama service implementation
pub struct OllamaService {
    client: Client,
    model: String,
    url: String,
}

impl OllamaService {
    pub fn new(model: String, host: Option<&str>) -> Result<Self, ConfigError> {
        let host = host.unwrap_or(DEFAULT_HOST).trim_end_matches('/');
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            model,
            url: format!("{host}/api/chat"),
        })
    }

    fn translate_request(&self, request: &LlmRequest, names: &ToolNameMap) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            messages: request.messages.iter().flat_map(|turn| translate_turn(turn, names)).collect(),
            tools: request
                .tools
                .iter()
                .map(|t| OllamaTool {
                    r#type: "function".to_string(),
                    function: OllamaFunction {
                        name: names.to_wire(&t.name),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    },
                })
                .collect(),
            stream: false,
        }
    }
}

/// Ollama has no call ids on the wire; results are matched to calls by order,
/// so each `tool_result` simply becomes a `tool` message in place.
fn translate_turn(turn: &Turn, names: &ToolNameMap) -> Vec<OllamaMessage> {
    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };

    let mut messages = Vec::new();
    let mut current = OllamaMessage::new(role);

    for block in &turn.content {
        match block {
            ContentBlock::Text { text } => {
                if !current.content.is_empty() {
                    current.content.push('\n');
                }
                current.content.push_str(text);
            }
            ContentBlock::ToolUse { name, input, .. } => current.tool_calls.push(OllamaToolCall {
                function: OllamaFunctionCall {
                    name: names.to_wire(name),
                    arguments: input.clone(),
                },
            }),
            ContentBlock::ToolResult { text, is_error, .. } => {
                if !current.is_empty() {
                    messages.push(std::mem::replace(&mut current, OllamaMessage::new(role)));
                }
                let mut result = OllamaMessage::new("tool");
                result.content = if *is_error {
                    format!("Error: {text}")
                } else {
                    text.clone()
                };
                messages.push(result);
            }
        }
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

fn normalize_response(resp: OllamaResponse, names: &ToolNameMap) -> LlmResponse {
    let tool_calls = resp
        .message
        .tool_calls
        .into_iter()
        .filter(|tc| !tc.function.name.is_empty())
        .map(|tc| ToolCall {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: names.to_canonical(&tc.function.name),
            arguments: tc.function.arguments,
        })
        .collect();

    let usage = Usage {
        input_tokens: resp.prompt_eval_count,
        output_tokens: resp.eval_count,
    };

    LlmResponse {
        text: Some(resp.message.content).filter(|t| !t.is_empty()),
        tool_calls,
        usage: if usage.is_zero() { None } else { Some(usage) },
    }
}

#[async_trait]
impl LlmService for OllamaService {
    async fn create_message(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let names = ToolNameMap::new(&request.tools);
        let ollama_request = self.translate_request(request, &names);

        let response = self
            .client
            .post(&self.url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| LlmError::from_send(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaErrorResponse>(&body)
                .map_or(body, |e| e.error);
            return Err(LlmError::from_status(status, &message));
        }

        let ollama_response: OllamaResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(normalize_response(ollama_response, &names))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
}

impl OllamaMessage {
    fn new(role: &str) -> Self {
        Self {
            role: role.to_string(),
            content: String::new(),
            tool_calls: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.content.is_empty() && self.tool_calls.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}
