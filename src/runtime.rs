//! Runtime for resolving prompts
//!
//! [`AgentRuntime`] is the process-wide application context: the model, the
//! tool executor, the tool catalog taken at startup and the long-lived
//! message history shared by every request.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use traits::*;

use crate::history::{History, Turn};
use crate::llm::{LlmError, LlmService, ToolDescriptor};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no model configured (set MCP_MODEL)")]
    NoModel,

    #[error("model request failed: {0}")]
    Model(#[from] LlmError),
}

/// Shared state behind every request handler
pub struct AgentRuntime {
    llm: Option<Arc<dyn LlmService>>,
    tools: Arc<dyn ToolExecutor>,
    catalog: Arc<[ToolDescriptor]>,
    history: Mutex<History>,
    history_window: usize,
    max_rounds: usize,
}

impl AgentRuntime {
    pub fn new(
        llm: Option<Arc<dyn LlmService>>,
        tools: Arc<dyn ToolExecutor>,
        catalog: Vec<ToolDescriptor>,
        history_window: usize,
        max_rounds: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            catalog: catalog.into(),
            history: Mutex::new(History::new()),
            history_window,
            max_rounds,
        }
    }

    /// Resolve `prompt` and merge the produced turns into history.
    ///
    /// The model only sees this resolution's turns. A failed resolution
    /// leaves history untouched.
    pub async fn run_prompt(&self, prompt: &str) -> Result<Vec<Turn>, RuntimeError> {
        let llm = self.llm.clone().ok_or(RuntimeError::NoModel)?;

        let resolution = ConversationRuntime::new(llm, self.tools.clone(), self.catalog.clone(), self.max_rounds)
            .run(prompt)
            .await?;

        tracing::info!(
            rounds = resolution.rounds,
            turns = resolution.turns.len(),
            input_tokens = resolution.usage.input_tokens,
            output_tokens = resolution.usage.output_tokens,
            total_tokens = resolution.usage.total(),
            "Prompt resolved"
        );

        self.history.lock().await.append(resolution.turns.iter().cloned());
        Ok(resolution.turns)
    }

    pub fn tool_catalog(&self) -> &[ToolDescriptor] {
        &self.catalog
    }

    /// The trailing history window and the full history length
    pub async fn recent_history(&self) -> (Vec<Turn>, usize) {
        let history = self.history.lock().await;
        (history.recent_window(self.history_window).to_vec(), history.len())
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }
}
