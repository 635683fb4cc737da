use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use ragserve::api;
use ragserve::config::Config;
use ragserve::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;

    // Index setup is best-effort at boot, ingestion retries it
    if let Err(err) = state.search.ensure_index().await {
        tracing::warn!(error = %err, "search index not ready at startup");
    }

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening");
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
