//! HTTP request handlers

use super::types::{ErrorResponse, PromptParams};
use super::AppState;
use crate::history::Turn;
use crate::llm::ToolDescriptor;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/prompt", post(prompt))
        .route("/tool", get(list_tools))
        .route("/history", get(history))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Run one full resolution and return the turns it produced
async fn prompt(
    State(state): State<AppState>,
    Query(query): Query<PromptParams>,
    form: Option<Form<PromptParams>>,
) -> Result<Json<Vec<Turn>>, AppError> {
    let prompt = form
        .and_then(|Form(params)| params.prompt)
        .or(query.prompt)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("prompt is required".to_string()))?;

    let turns = state.runtime.run_prompt(&prompt).await.map_err(|e| {
        tracing::error!(error = %e, "Prompt resolution failed");
        AppError::Internal(e.to_string())
    })?;

    Ok(Json(turns))
}

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDescriptor>> {
    Json(state.runtime.tool_catalog().to_vec())
}

async fn history(State(state): State<AppState>) -> Json<Vec<Turn>> {
    let (window, total) = state.runtime.recent_history().await;
    tracing::info!(
        window = state.runtime.history_window(),
        history_len = total,
        returned = window.len(),
        "History requested"
    );
    Json(window)
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
