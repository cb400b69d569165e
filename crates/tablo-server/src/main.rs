//! Tablo server entry point.
//!
//! Opens the storage backend, builds the services, then starts the Axum
//! HTTP server with graceful shutdown on SIGINT/SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use tablo_core::session::SessionIssuer;
use tablo_server::config::{ServerConfig, StorageBackendType};
use tablo_server::routes;
use tablo_server::state::AppState;
use tablo_storage::{MemoryBackend, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(storage = ?config.storage_backend, "Tablo starting");

    let storage = open_storage(&config.storage_backend).await?;

    let sessions = if let Some(secret) = &config.session_secret {
        SessionIssuer::new(secret.as_bytes())
    } else {
        warn!(
            "no TABLO_SESSION_SECRET or JWT_SECRET set; using a random secret, \
             sessions will not survive a restart"
        );
        SessionIssuer::with_random_secret()
    };

    let state = Arc::new(AppState::new(storage, Arc::new(sessions)));
    let app = routes::build_router(state, config.body_limit_bytes);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Tablo server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Tablo server stopped");
    Ok(())
}

async fn open_storage(backend: &StorageBackendType) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match backend {
        StorageBackendType::Memory => {
            warn!("using in-memory storage; all data is lost on restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "sqlite-backend")]
        StorageBackendType::Sqlite { path } => {
            let backend = tablo_storage::SqliteBackend::open(path)
                .await
                .with_context(|| format!("failed to open SQLite database at {path}"))?;
            info!(path = %path, "SQLite storage opened");
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "sqlite-backend"))]
        StorageBackendType::Sqlite { .. } => {
            anyhow::bail!("SQLite storage requested but the `sqlite-backend` feature is disabled")
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
