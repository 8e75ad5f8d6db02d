//! `OpenAI` and `OpenAI`-compatible Chat Completions backend

use super::types::{LlmRequest, LlmResponse, ToolCall, ToolNameMap, Usage};
use super::{LlmError, LlmService};
use crate::config::ConfigError;
use crate::history::{ContentBlock, Role, Turn};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible service implementation
pub struct OpenAIService {
    client: Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenAIService {
    pub fn new(api_key: String, model: String, base_url: Option<&str>) -> Result<Self, ConfigError> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model,
            url: format!("{base}/chat/completions"),
        })
    }

    fn translate_request(&self, request: &LlmRequest, names: &ToolNameMap) -> OpenAIRequest {
        let messages = request
            .messages
            .iter()
            .flat_map(|turn| Self::translate_message(turn, names))
            .collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OpenAITool {
                        r#type: "function".to_string(),
                        function: OpenAIFunction {
                            name: names.to_wire(&t.name),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            )
        };

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            tools,
            max_tokens: request.max_tokens,
        }
    }

    /// Translate a turn to `OpenAI` format.
    /// Returns a Vec because tool results need separate messages with role "tool".
    fn translate_message(turn: &Turn, names: &ToolNameMap) -> Vec<OpenAIMessage> {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();

        for block in &turn.content {
            match block {
                ContentBlock::Text { text } => text_parts.push(text.clone()),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(OpenAIToolCall {
                        id: id.clone(),
                        r#type: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: names.to_wire(name),
                            arguments: serde_json::to_string(input)
                                .unwrap_or_else(|_| "{}".to_string()),
                        },
                    });
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    text,
                    is_error,
                    ..
                } => tool_results.push((tool_use_id.clone(), text.clone(), *is_error)),
            }
        }

        let mut messages = Vec::new();

        if !text_parts.is_empty() || !tool_calls.is_empty() {
            messages.push(OpenAIMessage {
                role: role.to_string(),
                content: if text_parts.is_empty() {
                    None
                } else {
                    Some(text_parts.join("\n"))
                },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
            });
        }

        // Tool results are separate messages with role "tool"
        for (tool_use_id, content, is_error) in tool_results {
            messages.push(OpenAIMessage {
                role: "tool".to_string(),
                content: Some(if is_error {
                    format!("Error: {content}")
                } else {
                    content
                }),
                tool_calls: None,
                tool_call_id: Some(tool_use_id),
            });
        }

        messages
    }

    fn normalize_response(resp: OpenAIResponse, names: &ToolNameMap) -> Result<LlmResponse, LlmError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No choices in response"))?;

        let text = choice.message.content.filter(|t| !t.is_empty());

        let mut tool_calls = Vec::new();
        for tc in choice.message.tool_calls.unwrap_or_default() {
            if tc.function.name.is_empty() {
                continue;
            }
            let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                tracing::warn!(error = %e, arguments = %tc.function.arguments, "Failed to parse function call arguments");
                serde_json::json!({})
            });
            tool_calls.push(ToolCall {
                id: tc.id,
                name: names.to_canonical(&tc.function.name),
                arguments,
            });
        }

        Ok(LlmResponse {
            text,
            tool_calls,
            usage: resp.usage.map(|u| Usage {
                input_tokens: u64::from(u.prompt_tokens),
                output_tokens: u64::from(u.completion_tokens),
            }),
        })
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn create_message(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let names = ToolNameMap::new(&request.tools);
        let openai_request = self.translate_request(request, &names);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| LlmError::from_send(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            return Err(LlmError::from_status(status, &message));
        }

        let openai_response: OpenAIResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(openai_response, &names)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    r#type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}
