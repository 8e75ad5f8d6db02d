//! Tool-server launch document (`~/.mcp.json`)

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

const DEFAULT_FILE_NAME: &str = ".mcp.json";

/// How to launch one tool server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// Launch document: server id to launch command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpConfig {
    /// Ordered so registration runs in a stable order
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, ServerSpec>,
}

impl McpConfig {
    /// `$HOME/.mcp.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_FILE_NAME))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Load the document, creating an empty one if the file does not exist
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if !path.exists() {
            let config = Self::default();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
            let data = serde_json::to_string_pretty(&config).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            std::fs::write(path, data).map_err(io_err)?;
            tracing::info!(path = %path.display(), "Created empty tool server config");
            return Ok(config);
        }

        let data = std::fs::read_to_string(path).map_err(io_err)?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
