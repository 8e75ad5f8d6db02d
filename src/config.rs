//! Server configuration from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8115;
pub const DEFAULT_HISTORY_WINDOW: usize = 10;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_ROUNDS: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid model identifier {0:?}: expected provider:model")]
    InvalidModelSpec(String),

    #[error("unknown model provider {0:?} (expected anthropic, openai or ollama)")]
    UnknownProvider(String),

    #[error("{provider} requires {env_var} to be set")]
    MissingCredential {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("no home directory; set MCP_CONFIG_PATH")]
    NoHomeDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Process-wide settings, read once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Tool-server launch document; `None` means the per-user default
    pub config_path: Option<PathBuf>,
    pub history_window: usize,
    /// Raw `provider:model` identifier
    pub model: Option<String>,
    pub tool_timeout: Duration,
    pub max_rounds: usize,
    /// Client identification sent in the MCP handshake
    pub client_name: String,
    pub client_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            config_path: None,
            history_window: DEFAULT_HISTORY_WINDOW,
            model: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            max_rounds: DEFAULT_MAX_ROUNDS,
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            port: parse_or(var("MCP_SERVER_PORT"), "MCP_SERVER_PORT", defaults.port),
            config_path: var("MCP_CONFIG_PATH").map(PathBuf::from),
            history_window: parse_or(
                var("MCP_MESSAGE_WINDOW"),
                "MCP_MESSAGE_WINDOW",
                defaults.history_window,
            ),
            model: var("MCP_MODEL"),
            tool_timeout: Duration::from_secs(parse_or(
                var("MCP_TOOL_TIMEOUT_SECS"),
                "MCP_TOOL_TIMEOUT_SECS",
                defaults.tool_timeout.as_secs(),
            )),
            max_rounds: parse_or(var("MCP_MAX_ROUNDS"), "MCP_MAX_ROUNDS", defaults.max_rounds)
                .max(1),
            client_name: var("LIB_NAME").unwrap_or(defaults.client_name),
            client_version: var("LIB_VERSION").unwrap_or(defaults.client_version),
        }
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    let Some(raw) = value else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(variable = name, value = %raw, default = %default, "Invalid value, using default");
        default
    })
}
