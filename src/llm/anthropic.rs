//! Anthropic Messages API backend

use super::types::{LlmRequest, LlmResponse, ToolCall, ToolNameMap, Usage};
use super::{LlmError, LlmService};
use crate::config::ConfigError;
use crate::history::{ContentBlock, Role, Turn};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic service implementation
pub struct AnthropicService {
    client: Client,
    api_key: String,
    model: String,
    url: String,
}

impl AnthropicService {
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
            url: format!("{base}/v1/messages"),
        })
    }

    fn translate_request(&self, request: &LlmRequest, names: &ToolNameMap) -> AnthropicRequest {
        let tools: Vec<AnthropicTool> = request
            .tools
            .iter()
            .map(|t| AnthropicTool {
                name: names.to_wire(&t.name),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect();

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: translate_messages(&request.messages, names),
            tools: if tools.is_empty() { None } else { Some(tools) },
        }
    }
}

/// Translate turns into Anthropic messages.
///
/// Tool errors are recorded inside the assistant turn next to their
/// `tool_use`; Anthropic only accepts `tool_result` from the user, so those
/// blocks are moved into the following user message. Consecutive messages with
/// the same role are merged and empty ones dropped.
fn translate_messages(turns: &[Turn], names: &ToolNameMap) -> Vec<AnthropicMessage> {
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for turn in turns {
        let mut own = Vec::new();
        let mut hoisted = Vec::new();

        for block in &turn.content {
            let translated = translate_block(block, names);
            match (turn.role, block) {
                (Role::Assistant, ContentBlock::ToolResult { .. }) => hoisted.push(translated),
                _ => own.push(translated),
            }
        }

        push_merged(&mut messages, role_name(turn.role), own);
        push_merged(&mut messages, "user", hoisted);
    }

    messages
}

fn push_merged(messages: &mut Vec<AnthropicMessage>, role: &str, content: Vec<AnthropicContentBlock>) {
    if content.is_empty() {
        return;
    }
    match messages.last_mut() {
        Some(last) if last.role == role => last.content.extend(content),
        _ => messages.push(AnthropicMessage {
            role: role.to_string(),
            content,
        }),
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn translate_block(block: &ContentBlock, names: &ToolNameMap) -> AnthropicContentBlock {
    match block {
        ContentBlock::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
        ContentBlock::ToolUse { id, name, input } => AnthropicContentBlock::ToolUse {
            id: id.clone(),
            name: names.to_wire(name),
            input: input.clone(),
        },
        ContentBlock::ToolResult {
            tool_use_id,
            text,
            is_error,
            ..
        } => AnthropicContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: text.clone(),
            is_error: *is_error,
        },
    }
}

fn normalize_response(resp: AnthropicResponse, names: &ToolNameMap) -> LlmResponse {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in resp.content {
        match block {
            AnthropicContentBlock::Text { text } => text_parts.push(text),
            AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name: names.to_canonical(&name),
                arguments: input,
            }),
            AnthropicContentBlock::ToolResult { .. } => {
                tracing::debug!("Ignoring tool_result block in model response");
            }
        }
    }

    let text = text_parts.join("");
    LlmResponse {
        text: if text.is_empty() { None } else { Some(text) },
        tool_calls,
        usage: Some(Usage {
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
        }),
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn create_message(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let names = ToolNameMap::new(&request.tools);
        let anthropic_request = self.translate_request(request, &names);

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&anthropic_request)
            .send()
            .await
            .map_err(|e| LlmError::from_send(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            return Err(LlmError::from_status(status, &message));
        }

        let anthropic_response: AnthropicResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(normalize_response(anthropic_response, &names))
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}
