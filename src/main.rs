//! Resilient Cache - stats exporter server
//!
//! Builds one call dispatcher per configured domain and serves their metrics.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resilient_cache::{create_router, spawn_sweep_task, AppState, Config};

/// Main entry point for the stats exporter.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create one dispatcher per domain
/// 4. Start a background TTL sweep task per domain
/// 5. Serve the exporter until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resilient_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resilient Cache stats exporter");

    let config = Config::from_env();
    info!(
        "Configuration loaded: domains={:?}, max_entries={}, default_ttl_ms={}, max_failures={}, port={}",
        config.domains,
        config.dispatcher.max_entries,
        config.dispatcher.default_ttl_ms,
        config.dispatcher.max_failures,
        config.server_port
    );

    let state = AppState::from_config(&config);

    let sweep_handles: Vec<JoinHandle<()>> = state
        .dispatchers
        .values()
        .map(|dispatcher| spawn_sweep_task(dispatcher.clone(), config.sweep_interval))
        .collect();
    info!("Started {} TTL sweep task(s)", sweep_handles.len());

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handles))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the sweep tasks.
async fn shutdown_signal(sweep_handles: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
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

    for handle in sweep_handles {
        handle.abort();
    }
    warn!("TTL sweep tasks aborted");
}
