use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dlmm_bins::{create_router, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting DLMM Bins Service...");

    let config = ServiceConfig::load()?;
    let port = config.port;
    info!(
        "✓ Config loaded (default network {}, strategies: {})",
        config.default_network.as_str(),
        config
            .strategies
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let state = Arc::new(AppState::from_config(config)?);
    info!("✓ Upstream clients initialized");

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🚀 DLMM Bins Service listening on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
