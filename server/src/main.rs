//! Drop engine server.
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Installs the Prometheus exporter on the metrics port
//! - Opens the configured store (in-memory or `PostgreSQL`, migrated on startup)
//! - Serves the HTTP API until Ctrl+C or SIGTERM, then drains within the shutdown timeout
//!
//! # Usage
//!
//! ```bash
//! # In-memory store
//! cargo run -p drop-engine-server
//!
//! # PostgreSQL store
//! STORE_BACKEND=postgres DATABASE_URL=postgres://localhost/drops cargo run -p drop-engine-server
//! ```

mod config;

use anyhow::Context;
use config::{Config, StoreBackend};
use drop_engine_core::environment::SystemClock;
use drop_engine_core::store::DropStore;
use drop_engine_postgres::{PostgresConfig, PostgresDropStore};
use drop_engine_runtime::metrics::install_prometheus_exporter;
use drop_engine_runtime::{DropEngine, InMemoryDropStore, RetryPolicy};
use drop_engine_web::{AppState, router};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.server.log_level)
                .unwrap_or_else(|_| "info,drop_engine=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        addr = %config.bind_addr(),
        backend = %config.store.backend,
        "Starting drop engine server"
    );

    let metrics_addr: SocketAddr = config
        .metrics_addr()
        .parse()
        .context("Invalid METRICS_HOST/METRICS_PORT")?;
    install_prometheus_exporter(metrics_addr)?;

    let store = open_store(&config).await?;
    let retry = RetryPolicy::builder()
        .max_retries(config.retry.max_retries)
        .initial_delay(Duration::from_millis(config.retry.initial_delay_ms))
        .max_delay(Duration::from_millis(config.retry.max_delay_ms))
        .build();
    let engine = DropEngine::new(store, Arc::new(SystemClock)).with_retry_policy(retry);
    let app = router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    tracing::info!(addr = %config.bind_addr(), "HTTP server listening");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .into_future(),
    );

    tokio::select! {
        result = &mut server => {
            // The server stopped on its own; surface why.
            result.context("Server task panicked")??;
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    tracing::info!(
        timeout_secs = config.server.shutdown_timeout,
        "Shutdown signal received, draining connections"
    );
    let _ = stop_tx.send(());

    match tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout), server).await {
        Ok(result) => {
            result.context("Server task panicked")??;
            tracing::info!("Server stopped");
        }
        Err(_) => tracing::warn!("Shutdown timeout elapsed, exiting with open connections"),
    }
    Ok(())
}

/// Opens the configured store, running migrations for `PostgreSQL`.
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn DropStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; state is lost on restart");
            Ok(Arc::new(InMemoryDropStore::new()))
        }
        StoreBackend::Postgres => {
            let pg = &config.postgres;
            let store = PostgresDropStore::connect(
                &pg.url,
                &PostgresConfig {
                    max_connections: pg.max_connections,
                    min_connections: pg.min_connections,
                    connect_timeout: Duration::from_secs(pg.connect_timeout),
                },
            )
            .await
            .context("Failed to connect to PostgreSQL")?;
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!(
                max_connections = pg.max_connections,
                "PostgreSQL store ready"
            );
            Ok(Arc::new(store))
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
