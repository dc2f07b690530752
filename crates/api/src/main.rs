//! VaultLens API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use vaultlens_common::config::AppConfig;

use vaultlens_api::routes::create_router;
use vaultlens_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "vaultlens_api=debug,vaultlens_cache=debug,vaultlens_resolvers=debug,tower_http=debug",
            )
        }))
        .init();

    tracing::info!("Starting VaultLens API server...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let port = config.api_port;

    tracing::info!(
        node = %config.aptos_node_url,
        protocol = %config.protocol_address.short(),
        metadata_stale_secs = config.metadata_stale_secs,
        withdraw_margin = config.withdraw_margin,
        "Configuration loaded"
    );

    // Build application state
    let state = AppState::connect(config)?;

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
