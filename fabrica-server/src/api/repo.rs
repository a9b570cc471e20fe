//! Repo API Handlers
//!
//! HTTP endpoints for watched repositories.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use fabrica_core::domain::build::Build;
use fabrica_core::domain::repo::Repo;
use fabrica_core::dto::repo::{CreateRepo, DeleteRepo};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::repo_service;

/// GET /v1/repos
/// List watched repositories
pub async fn list_repos(State(state): State<AppState>) -> ApiResult<Json<Vec<Repo>>> {
    tracing::debug!("Listing repositories");

    let repos = repo_service::list(&state.pool).await?;

    Ok(Json(repos))
}

/// POST /v1/repos
/// Register a repository
pub async fn create_repo(
    State(state): State<AppState>,
    Json(req): Json<CreateRepo>,
) -> ApiResult<(StatusCode, Json<Repo>)> {
    tracing::info!("Creating repository: {} ({})", req.repo, req.branch);

    let repo = repo_service::create(&state.pool, req).await?;

    Ok((StatusCode::CREATED, Json(repo)))
}

/// GET /v1/repos/{id}/builds
/// List the builds of a repository
pub async fn list_repo_builds(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Build>>> {
    tracing::debug!("Listing builds of repository: {}", id);

    let builds = repo_service::builds(&state.pool, id).await?;

    Ok(Json(builds))
}

/// DELETE /v1/repos/{id}?deleteBuilds=true
/// Delete a repository, optionally with its finished builds
pub async fn delete_repo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteRepo>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting repository: {} (builds: {})", id, query.delete_builds);

    repo_service::delete(&state.pool, &state.orchestrator, id, query.delete_builds).await?;

    Ok(StatusCode::NO_CONTENT)
}
