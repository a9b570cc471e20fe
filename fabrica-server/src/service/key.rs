//! Key Service
//!
//! Business logic for SSH key management.

use fabrica_core::domain::key::KeySummary;
use fabrica_core::dto::key::CreateKey;
use fabrica_runner::credentials::decode_key;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::repository::key_repository;

/// Service error type
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key {0} not found")]
    NotFound(Uuid),

    #[error("{0}")]
    ValidationError(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Register a new SSH key
pub async fn create(pool: &SqlitePool, mut req: CreateKey) -> Result<KeySummary, KeyError> {
    validate_key(&mut req)?;

    let key = key_repository::create(pool, req).await?;
    tracing::info!("Key created: {} ({})", key.id, key.name);

    Ok(KeySummary::from(&key))
}

/// List all keys without their material
pub async fn list(pool: &SqlitePool) -> Result<Vec<KeySummary>, KeyError> {
    let keys = key_repository::list_all(pool).await?;
    Ok(keys.iter().map(KeySummary::from).collect())
}

/// Delete a key
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), KeyError> {
    if !key_repository::delete(pool, id).await? {
        return Err(KeyError::NotFound(id));
    }

    tracing::info!("Key {} deleted", id);
    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_key(req: &mut CreateKey) -> Result<(), KeyError> {
    req.name = req.name.trim().to_string();
    if req.name.is_empty() {
        return Err(KeyError::ValidationError(
            "name cannot be empty".to_string(),
        ));
    }

    req.data = req.data.trim().to_string();
    if req.data.is_empty() {
        return Err(KeyError::ValidationError(
            "data cannot be empty".to_string(),
        ));
    }

    let material = decode_key(&req.data)
        .map_err(|_| KeyError::ValidationError("data must be base64-encoded".to_string()))?;
    if material.is_empty() {
        return Err(KeyError::ValidationError(
            "data decodes to an empty key".to_string(),
        ));
    }

    Ok(())
}
