//! mcphost server
//!
//! HTTP bridge between a language model and a set of MCP tool servers.

mod api;
mod config;
mod history;
mod llm;
mod mcp;
mod runtime;

use api::{create_router, AppState};
use config::ServerConfig;
use llm::{LlmConfig, LlmService, ModelSpec};
use mcp::{ClientIdentity, McpConfig, McpRegistry, StdioLauncher};
use runtime::AgentRuntime;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcphost_server=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env();

    // A missing or broken model setting leaves the tool endpoints usable
    let llm = build_llm(&config);

    let launcher = StdioLauncher::new(ClientIdentity {
        name: config.client_name.clone(),
        version: config.client_version.clone(),
    });
    let registry = Arc::new(McpRegistry::new(Arc::new(launcher), config.tool_timeout));
    register_servers(&config, &registry).await;

    let catalog = registry.catalog().await;
    tracing::info!(tools = catalog.len(), "Tool catalog ready");

    let runtime = AgentRuntime::new(
        llm,
        registry.clone(),
        catalog,
        config.history_window,
        config.max_rounds,
    );
    let state = AppState::new(Arc::new(runtime));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "mcphost server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    registry.shutdown().await;
    served?;
    Ok(())
}

fn build_llm(config: &ServerConfig) -> Option<Arc<dyn LlmService>> {
    let Some(model) = config.model.as_deref() else {
        tracing::error!("MCP_MODEL is not set; prompts will fail until it is configured");
        return None;
    };

    let service = model
        .parse::<ModelSpec>()
        .and_then(|spec| llm::create_service(&spec, &LlmConfig::from_env()));

    match service {
        Ok(service) => {
            tracing::info!(provider = %service.name(), model = %service.model_id(), "Model configured");
            Some(service)
        }
        Err(e) => {
            tracing::error!(model = %model, error = %e, "Failed to configure model");
            None
        }
    }
}

/// Load the launch document and start every server in it. Failures are
/// logged and leave the registry empty.
async fn register_servers(config: &ServerConfig, registry: &McpRegistry) {
    let path = match config.config_path.clone().map_or_else(McpConfig::default_path, Ok) {
        Ok(path) => path,
        Err(e) => {
            tracing::error!(error = %e, "No tool server config path");
            return;
        }
    };

    let mcp_config = match McpConfig::load_or_create(&path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load tool server config");
            return;
        }
    };

    match registry.register_all(&mcp_config.servers).await {
        Ok(count) => tracing::info!(servers = count, path = %path.display(), "Tool servers initialized"),
        Err(e) => tracing::error!(error = %e, "Tool server registration failed; continuing without tools"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
