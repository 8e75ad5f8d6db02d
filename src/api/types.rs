//! API request and response types

use serde::{Deserialize, Serialize};

/// `prompt` field, from a form body or the query string
#[derive(Debug, Default, Deserialize)]
pub struct PromptParams {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
