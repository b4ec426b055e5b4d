//! Expiring LRU server
//!
//! Serves a `Cache<String, String>` over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use expiring_lru::api::{create_router, AppState};
use expiring_lru::config::{Config, StorageBackend};
use expiring_lru::{Cache, FileStore, MemoryStore, Storage};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the configured storage backend
/// 4. Create the cache (starts the expiry sweep)
/// 5. Serve HTTP until SIGINT/SIGTERM
/// 6. Stop the cache, flushing the backend
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expiring_lru=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Expiring LRU Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, default_ttl={}ms, expiry_check_interval={}ms, port={}, storage={:?}",
        config.max_entries,
        config.default_ttl_ms,
        config.expiry_check_interval_ms,
        config.server_port,
        config.storage
    );
    let cache_config = config
        .cache_config()
        .context("invalid cache configuration")?;

    let storage: Arc<dyn Storage<String, String>> = match &config.storage {
        StorageBackend::Memory => Arc::new(MemoryStore::<String, String>::new()),
        StorageBackend::File { path, sync } => {
            let store = FileStore::<String, String>::open(path.clone(), *sync).await;
            info!(path = %store.path().display(), sync = ?sync, "Using file storage");
            Arc::new(store)
        }
    };

    let cache = Cache::with_shared_storage(cache_config, storage);
    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // The library has no lifecycle hooks of its own; stopping is our job
    cache.stop().await.context("failed to stop cache")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
