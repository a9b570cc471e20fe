//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{
    build_service::BuildServiceError, key_service::KeyError, repo_service::RepoError,
};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    DatabaseError(sqlx::Error),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<BuildServiceError> for ApiError {
    fn from(err: BuildServiceError) -> Self {
        match err {
            BuildServiceError::NotFound(_)
            | BuildServiceError::KeyNotFound(_)
            | BuildServiceError::NoArtifact(_) => ApiError::NotFound(err.to_string()),
            BuildServiceError::InvalidState(msg) | BuildServiceError::ValidationError(msg) => {
                ApiError::BadRequest(msg)
            }
            BuildServiceError::DatabaseError(err) => ApiError::DatabaseError(err),
            BuildServiceError::IoError(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<KeyError> for ApiError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::NotFound(_) => ApiError::NotFound(err.to_string()),
            KeyError::ValidationError(msg) => ApiError::BadRequest(msg),
            KeyError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(_) | RepoError::KeyNotFound(_) => ApiError::NotFound(err.to_string()),
            RepoError::AlreadyExists(..) => ApiError::BadRequest(err.to_string()),
            RepoError::ValidationError(msg) => ApiError::BadRequest(msg),
            RepoError::DatabaseError(err) => ApiError::DatabaseError(err),
            RepoError::Build(err) => err.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
