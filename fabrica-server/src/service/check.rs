//! Check Service
//!
//! Reports whether the host is ready to run builds.

use fabrica_core::domain::check::{ConnectionCheck, ImageCheck};
use fabrica_runner::BuildOrchestrator;
use fabrica_runner::check::{check_build_root, check_images, check_runtime};
use sqlx::SqlitePool;

use crate::db;

/// Availability of the image of every configured distro
pub async fn images(orchestrator: &BuildOrchestrator) -> Vec<ImageCheck> {
    check_images(orchestrator.runtime(), orchestrator.config()).await
}

/// State of the database, the container runtime and the build root
pub async fn connections(pool: &SqlitePool, orchestrator: &BuildOrchestrator) -> Vec<ConnectionCheck> {
    let database = match db::ping(pool).await {
        Ok(()) => ConnectionCheck::ok("database"),
        Err(e) => ConnectionCheck::failed("database", e.to_string()),
    };

    let checks = vec![
        database,
        check_runtime(orchestrator.runtime()).await,
        check_build_root(orchestrator.config()).await,
    ];

    for check in checks.iter().filter(|c| !c.connected) {
        tracing::warn!(
            "Connection check {} failed: {}",
            check.name,
            check.message.as_deref().unwrap_or_default()
        );
    }

    checks
}
