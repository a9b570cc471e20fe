//! Build Service
//!
//! Business logic for launching builds and managing their records.

use fabrica_core::domain::build::{Build, BuildRequest, BuildStatus, project_name};
use fabrica_core::dto::build::CreateBuild;
use fabrica_runner::BuildOrchestrator;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::repository::{build_repository, key_repository, log_repository};

/// Service error type
#[derive(Debug, Error)]
pub enum BuildServiceError {
    #[error("Build {0} not found")]
    NotFound(Uuid),

    #[error("Key {0} not found")]
    KeyNotFound(Uuid),

    #[error("Build {0} has no artifact")]
    NoArtifact(Uuid),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Create a build record and start running it in the background
///
/// Returns the queued record immediately; the run updates it as it goes.
pub async fn launch(
    pool: &SqlitePool,
    orchestrator: Arc<BuildOrchestrator>,
    req: CreateBuild,
) -> Result<Build, BuildServiceError> {
    let request = validate_request(req)?;

    if let Some(key_id) = request.key_id {
        key_repository::find_by_id(pool, key_id)
            .await?
            .ok_or(BuildServiceError::KeyNotFound(key_id))?;
    }

    let build = build_repository::create(pool, &request).await?;
    tracing::info!(
        "Build created: {} for {} ({} on {})",
        build.id,
        build.repo,
        build.branch,
        build.distro
    );

    tokio::spawn(execute(pool.clone(), orchestrator, build.id, request));

    Ok(build)
}

/// Run one build to completion and record the outcome
pub async fn execute(
    pool: SqlitePool,
    orchestrator: Arc<BuildOrchestrator>,
    build_id: Uuid,
    request: BuildRequest,
) {
    if let Err(e) = build_repository::update_status(&pool, build_id, BuildStatus::InProgress).await
    {
        tracing::error!("Failed to mark build {} in progress: {}", build_id, e);
    }

    let started = Instant::now();
    let status = match orchestrator.run_build(build_id, &request).await {
        Ok(artifact) => {
            tracing::info!(
                "Build {} produced {}",
                build_id,
                artifact.local_path.display()
            );
            BuildStatus::Complete
        }
        Err(e) => {
            tracing::warn!("Build {} failed ({}): {}", build_id, e.kind(), e);
            BuildStatus::Failed
        }
    };
    let duration = started.elapsed().as_secs() as i64;

    if let Err(e) = build_repository::finish(&pool, build_id, status, duration).await {
        tracing::error!("Failed to record outcome of build {}: {}", build_id, e);
        return;
    }

    tracing::info!(
        "Build {} finished with status {} in {}s",
        build_id,
        status,
        duration
    );
}

/// Close the records of builds a previous process left unfinished
///
/// Their containers are gone with the process, so the builds are marked
/// failed and can then be deleted like any other finished build.
pub async fn fail_interrupted(pool: &SqlitePool) -> Result<usize, BuildServiceError> {
    let ids = build_repository::fail_unfinished(pool).await?;

    for id in &ids {
        tracing::warn!("Build {} was interrupted by a restart", id);
        log_repository::append(pool, *id, "Build interrupted: the server restarted").await?;
    }

    Ok(ids.len())
}

/// Get a build by ID, with its logs
pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Build, BuildServiceError> {
    let mut build = build_repository::find_by_id(pool, id)
        .await?
        .ok_or(BuildServiceError::NotFound(id))?;

    build.logs = log_repository::find_by_build(pool, id).await?;

    Ok(build)
}

/// List all builds
pub async fn list(pool: &SqlitePool) -> Result<Vec<Build>, BuildServiceError> {
    let builds = build_repository::list_all(pool).await?;
    Ok(builds)
}

/// Delete a finished build, its logs and its staged artifact
pub async fn delete(
    pool: &SqlitePool,
    orchestrator: &BuildOrchestrator,
    id: Uuid,
) -> Result<(), BuildServiceError> {
    let build = build_repository::find_by_id(pool, id)
        .await?
        .ok_or(BuildServiceError::NotFound(id))?;

    if !build.status.is_finished() {
        return Err(BuildServiceError::InvalidState(format!(
            "Cannot delete build {} while it is {}",
            id, build.status
        )));
    }

    log_repository::delete_by_build(pool, id).await?;
    build_repository::delete(pool, id).await?;

    let dir = orchestrator.config().artifact_dir(id);
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => tracing::debug!("Removed {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    tracing::info!("Build {} deleted", id);
    Ok(())
}

/// Local path of a build's artifact
pub async fn artifact_path(pool: &SqlitePool, id: Uuid) -> Result<PathBuf, BuildServiceError> {
    let build = build_repository::find_by_id(pool, id)
        .await?
        .ok_or(BuildServiceError::NotFound(id))?;

    build
        .download
        .map(PathBuf::from)
        .ok_or(BuildServiceError::NoArtifact(id))
}

// =============================================================================
// Validation
// =============================================================================

fn validate_request(req: CreateBuild) -> Result<BuildRequest, BuildServiceError> {
    let repo = req.repo.trim().to_string();
    if repo.is_empty() {
        return Err(BuildServiceError::ValidationError(
            "repo cannot be empty".to_string(),
        ));
    }

    let branch = req.branch.trim().to_string();
    if branch.is_empty() {
        return Err(BuildServiceError::ValidationError(
            "branch cannot be empty".to_string(),
        ));
    }

    let distro = req.distro.trim().to_string();
    if distro.is_empty() || !distro.chars().all(is_name_char) {
        return Err(BuildServiceError::ValidationError(format!(
            "invalid distro '{}'",
            distro
        )));
    }

    let name = match req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => project_name(&repo).ok_or_else(|| {
            BuildServiceError::ValidationError(format!(
                "cannot derive a project name from '{}'",
                repo
            ))
        })?,
    };
    if name == "." || name == ".." || !name.chars().all(is_name_char) {
        return Err(BuildServiceError::ValidationError(format!(
            "invalid project name '{}'",
            name
        )));
    }

    let key_id = match req.key_id.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(key_id) => Some(Uuid::parse_str(key_id).map_err(|_| {
            BuildServiceError::ValidationError(format!("invalid keyId '{}'", key_id))
        })?),
        None => None,
    };

    Ok(BuildRequest {
        name,
        repo,
        branch,
        key_id,
        distro,
    })
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}
