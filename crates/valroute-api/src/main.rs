//! # valroute-api: Binary Entry Point
//!
//! Starts the Axum HTTP server with the schema-validated routes.
//! Binds to `0.0.0.0:$PORT` (default 3000).

use anyhow::Context;
use valroute_api::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    let port = config.port;

    let state = AppState::try_with_config(config).map_err(|e| {
        tracing::error!("Schema registry initialization failed: {e}");
        e
    })?;
    tracing::info!(
        schemas = state.registry.schema_count(),
        source = %state
            .registry
            .source_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "embedded".to_string()),
        "schema registry loaded"
    );

    let app = valroute_api::app(state).context("route registration failed")?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("valroute API listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
