//! Key API Handlers
//!
//! HTTP endpoints for SSH key management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use fabrica_core::domain::key::KeySummary;
use fabrica_core::dto::key::CreateKey;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::key_service;

/// GET /v1/keys
/// List keys without their material
pub async fn list_keys(State(state): State<AppState>) -> ApiResult<Json<Vec<KeySummary>>> {
    tracing::debug!("Listing keys");

    let keys = key_service::list(&state.pool).await?;

    Ok(Json(keys))
}

/// POST /v1/keys
/// Register a new SSH key
pub async fn create_key(
    State(state): State<AppState>,
    Json(req): Json<CreateKey>,
) -> ApiResult<(StatusCode, Json<KeySummary>)> {
    tracing::info!("Creating key: {}", req.name);

    let key = key_service::create(&state.pool, req).await?;

    Ok((StatusCode::CREATED, Json(key)))
}

/// DELETE /v1/keys/{id}
/// Delete an SSH key
pub async fn delete_key(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting key: {}", id);

    key_service::delete(&state.pool, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
