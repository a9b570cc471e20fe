//! Build API Handlers
//!
//! HTTP endpoints for launching builds and retrieving their results.

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use fabrica_core::domain::build::Build;
use fabrica_core::dto::build::CreateBuild;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::build_service;

/// POST /v1/build
/// Create a build and start it
pub async fn launch_build(
    State(state): State<AppState>,
    Json(req): Json<CreateBuild>,
) -> ApiResult<(StatusCode, Json<Build>)> {
    tracing::info!("Launching build for {} ({})", req.repo, req.distro);

    let build = build_service::launch(&state.pool, state.orchestrator.clone(), req).await?;

    Ok((StatusCode::CREATED, Json(build)))
}

/// GET /v1/builds
/// List all builds
pub async fn list_builds(State(state): State<AppState>) -> ApiResult<Json<Vec<Build>>> {
    tracing::debug!("Listing builds");

    let builds = build_service::list(&state.pool).await?;

    Ok(Json(builds))
}

/// GET /v1/builds/{id}
/// Get build details, including its log
pub async fn get_build(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Build>> {
    tracing::debug!("Getting build: {}", id);

    let build = build_service::get(&state.pool, id).await?;

    Ok(Json(build))
}

/// DELETE /v1/builds/{id}
/// Delete a finished build and its artifact
pub async fn delete_build(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting build: {}", id);

    build_service::delete(&state.pool, &state.orchestrator, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/builds/{id}/download
/// Download the artifact of a successful build
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    tracing::debug!("Downloading artifact of build: {}", id);

    let path = build_service::artifact_path(&state.pool, id).await?;
    let content = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound(format!("Artifact of build {} is missing", id))
        } else {
            ApiError::InternalError(format!("Failed to read {}: {}", path.display(), e))
        }
    })?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.snap", id));

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from(content),
    )
        .into_response())
}
