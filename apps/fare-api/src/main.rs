//! Fare API server entry point.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use farelink_api::{create_app, ApiConfig, AppState};
use farelink_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,farelink=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Farelink fare API...");

    // Load configuration
    let config = ApiConfig::load()?;
    info!(
        port = config.http_port,
        database = %config.database_path.display(),
        min_fuzzy_uid_len = config.min_fuzzy_uid_len,
        max_fare = ?config.max_fare,
        "Configuration loaded"
    );

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    // Connect to database (runs migrations)
    let db = Database::new(config.db_config()).await?;
    info!("Database ready");

    let addr = config.listen_addr()?;
    let state = Arc::new(AppState::new(db.clone(), config));
    let app = create_app(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Fare API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
