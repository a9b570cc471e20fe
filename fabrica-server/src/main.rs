//! Fabrica Server
//!
//! HTTP service that builds snaps from git repositories.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: SQLite access for builds, build logs and SSH keys
//! - Services: Build launching and record keeping, key and repository
//!   management, environment checks
//! - API: axum endpoints under /v1
//!
//! Every accepted build runs immediately in its own container through the
//! runner's orchestrator; its progress is written to the build log.

mod api;
mod config;
mod db;
mod repository;
mod service;
mod store;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use fabrica_runner::{BuildOrchestrator, PodmanRuntime};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fabrica_server=info,fabrica_runner=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Fabrica Server...");

    // Load configuration
    let config = ServerConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: bind_addr={}, build_root={}, debug={}",
        config.bind_addr,
        config.runner.build_root.display(),
        config.runner.debug
    );

    tokio::fs::create_dir_all(&config.runner.build_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create build root {}",
                config.runner.build_root.display()
            )
        })?;

    let runtime = PodmanRuntime::new();
    runtime
        .check_available()
        .await
        .context("Container runtime is not available")?;

    info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let interrupted = service::build_service::fail_interrupted(&pool)
        .await
        .context("Failed to close interrupted builds")?;
    if interrupted > 0 {
        info!("Marked {} interrupted builds as failed", interrupted);
    }

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let orchestrator = Arc::new(BuildOrchestrator::new(
        Arc::new(runtime),
        store.clone(),
        store,
        Arc::new(config.runner.clone()),
    ));

    // Build router with all API endpoints
    let app = api::create_router(AppState { pool, orchestrator });

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
