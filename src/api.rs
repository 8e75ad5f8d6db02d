//! HTTP API
//!
//! `/health`, `/prompt`, `/tool` and `/history` over the shared
//! [`AgentRuntime`].

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::AgentRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
}

impl AppState {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}
