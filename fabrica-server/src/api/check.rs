//! Check API Handlers

use axum::{Json, extract::State};
use fabrica_core::domain::check::{ConnectionCheck, ImageCheck};

use crate::api::AppState;
use crate::service::check_service;

/// GET /v1/check/images
/// Report which distro images the runtime can resolve
pub async fn check_images(State(state): State<AppState>) -> Json<Vec<ImageCheck>> {
    Json(check_service::images(&state.orchestrator).await)
}

/// GET /v1/check/connections
/// Report whether the services builds depend on are reachable
pub async fn check_connections(State(state): State<AppState>) -> Json<Vec<ConnectionCheck>> {
    Json(check_service::connections(&state.pool, &state.orchestrator).await)
}
