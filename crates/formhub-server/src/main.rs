//! Formhub server entry point.
//!
//! Reads configuration, sets up logging, wraps the configured storage
//! backend in a lazy handle, and starts the Axum HTTP server with graceful
//! shutdown. The backend is not contacted until the first request needs it.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use formhub_core::session::TokenSigner;
use formhub_storage::{LazyBackend, MemoryBackend, StorageBackend};

use formhub_server::build_router;
use formhub_server::config::{ServerConfig, StorageBackendType};
use formhub_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(storage = ?config.storage_backend, "Formhub starting");

    let storage = Arc::new(lazy_storage(&config)?);
    let tokens = TokenSigner::new(config.jwt_secret.as_bytes(), config.token_ttl_secs);
    let state = Arc::new(AppState::new(storage, tokens));

    let app = build_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Formhub server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Formhub server stopped");
    Ok(())
}

/// Build the storage handle for the configured backend. Nothing connects yet.
fn lazy_storage(config: &ServerConfig) -> anyhow::Result<LazyBackend> {
    match &config.storage_backend {
        StorageBackendType::Memory => {
            info!("using in-memory storage (data will not persist)");
            Ok(LazyBackend::ready(
                Arc::new(MemoryBackend::new()) as Arc<dyn StorageBackend>
            ))
        }
        #[cfg(feature = "postgres-backend")]
        StorageBackendType::Postgres { url } => {
            info!(url = %"[redacted]", "using PostgreSQL storage");
            let url = url.clone();
            Ok(LazyBackend::new(move || {
                let url = url.clone();
                async move {
                    let backend = formhub_storage::PostgresBackend::connect(&url).await?;
                    Ok::<Arc<dyn StorageBackend>, formhub_storage::StorageError>(Arc::new(backend))
                }
            }))
        }
        #[cfg(not(feature = "postgres-backend"))]
        StorageBackendType::Postgres { .. } => {
            anyhow::bail!(
                "PostgreSQL backend requested but feature 'postgres-backend' is not enabled"
            );
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
