//! Provider selection from a `provider:model` identifier

use super::{AnthropicService, LlmService, LoggingService, OllamaService, OpenAIService};
use crate::config::ConfigError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    OpenAI,
    Ollama,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Anthropic, Provider::OpenAI, Provider::Ollama];

    /// Identifier used in `MCP_MODEL`
    pub fn id(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAI => "openai",
            Provider::Ollama => "ollama",
        }
    }

    /// Environment variable holding this provider's API key, if it needs one
    pub fn api_key_env_var(self) -> Option<&'static str> {
        match self {
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::OpenAI => Some("OPENAI_API_KEY"),
            Provider::Ollama => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.id() == s)
            .ok_or_else(|| ConfigError::UnknownProvider(s.to_string()))
    }
}

/// Parsed `provider:model` identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub provider: Provider,
    pub model: String,
}

impl FromStr for ModelSpec {
    type Err = ConfigError;

    /// Splits at the first `:` so model names may contain colons
    /// (e.g. `ollama:llama3.2:3b`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidModelSpec(s.to_string()))?;
        if model.is_empty() {
            return Err(ConfigError::InvalidModelSpec(s.to_string()));
        }
        Ok(Self {
            provider: provider.parse()?,
            model: model.to_string(),
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Credentials and endpoints for the model providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub ollama_host: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            anthropic_base_url: var("ANTHROPIC_BASE_URL"),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL"),
            ollama_host: var("OLLAMA_HOST"),
        }
    }

    fn require_key(&self, provider: Provider) -> Result<String, ConfigError> {
        let key = match provider {
            Provider::Anthropic => self.anthropic_api_key.as_ref(),
            Provider::OpenAI => self.openai_api_key.as_ref(),
            Provider::Ollama => None,
        };
        key.cloned().ok_or(ConfigError::MissingCredential {
            provider: provider.id(),
            env_var: provider.api_key_env_var().unwrap_or_default(),
        })
    }
}

/// Build the backend for a parsed model identifier, wrapped with request logging
pub fn create_service(
    spec: &ModelSpec,
    config: &LlmConfig,
) -> Result<Arc<dyn LlmService>, ConfigError> {
    let service: Arc<dyn LlmService> = match spec.provider {
        Provider::Anthropic => Arc::new(AnthropicService::new(
            config.require_key(Provider::Anthropic)?,
            spec.model.clone(),
            config.anthropic_base_url.as_deref(),
        )?),
        Provider::OpenAI => Arc::new(OpenAIService::new(
            config.require_key(Provider::OpenAI)?,
            spec.model.clone(),
            config.openai_base_url.as_deref(),
        )?),
        Provider::Ollama => Arc::new(OllamaService::new(
            spec.model.clone(),
            config.ollama_host.as_deref(),
        )?),
    };
    Ok(Arc::new(LoggingService::new(service)))
}
