//! Tollbooth - metered LLM access over HTTP.
//!
//! Entry point: load configuration, open the store, build the router, serve.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tollbooth_service::{create_router, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tollbooth=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tollbooth service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        completion_configured = %config.completion_api_key.is_some(),
        stripe_configured = %config.stripe_api_key.is_some(),
        webhook_secret_configured = %config.stripe_webhook_secret.is_some(),
        "Service configuration loaded"
    );

    let store = open_store(&config)?;

    let state = AppState::new(store, config.clone());
    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(
    config: &ServiceConfig,
) -> Result<Arc<dyn tollbooth_store::Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(tollbooth_store::RocksStore::open(
        &config.data_dir,
    )?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(
    _config: &ServiceConfig,
) -> Result<Arc<dyn tollbooth_store::Store>, Box<dyn std::error::Error>> {
    tracing::warn!("Built without the rocksdb-backend feature; using in-memory storage");
    Ok(Arc::new(tollbooth_store::MemoryStore::new()))
}
