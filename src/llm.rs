//! Model backend abstraction
//!
//! Every backend turns the accumulated conversation plus the tool catalog into
//! the next assistant turn. Authentication, endpoints and vendor wire formats
//! stay inside the concrete implementations.

mod anthropic;
mod error;
mod models;
mod ollama;
mod openai;
mod types;

pub use anthropic::AnthropicService;
pub use error::LlmError;
pub use models::{create_service, LlmConfig, ModelSpec};
pub use ollama::OllamaService;
pub use openai::OpenAIService;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for model backends
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Produce the next assistant turn for the conversation in `request`
    async fn create_message(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Provider name (e.g. "anthropic")
    fn name(&self) -> &str;

    /// Model identifier sent to the provider
    fn model_id(&self) -> &str;
}

/// Logging wrapper for model backends
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    name: String,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let name = inner.name().to_string();
        let model_id = inner.model_id().to_string();
        Self {
            inner,
            name,
            model_id,
        }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn create_message(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.create_message(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                let usage = response.usage.unwrap_or_default();
                tracing::info!(
                    provider = %self.name,
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    tool_calls = response.tool_calls.len(),
                    follow_up = request.prompt.is_empty(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.name,
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    follow_up = request.prompt.is_empty(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Turn;
    use crate::runtime::testing::MockLlmService;

    fn request(prompt: &str) -> LlmRequest {
        LlmRequest {
            prompt: prompt.to_string(),
            messages: vec![Turn::user_text("hi")],
            tools: Vec::new(),
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn test_logging_service_passes_requests_through() {
        let mock = Arc::new(MockLlmService::new());
        mock.queue_response(LlmResponse::text("hello").with_usage(4, 2));
        mock.queue_error(LlmError::server_error("overloaded"));
        let service = LoggingService::new(mock.clone());
        assert_eq!(service.name(), mock.name());
        assert_eq!(service.model_id(), mock.model_id());

        let response = service.create_message(&request("hi")).await.unwrap();
        assert_eq!(response.text.as_deref(), Some("hello"));

        let err = service.create_message(&request("")).await.unwrap_err();
        assert_eq!(err.message, "overloaded");

        let prompts: Vec<_> = mock.recorded_requests().into_iter().map(|r| r.prompt).collect();
        assert_eq!(prompts, ["hi", ""]);
    }
}
