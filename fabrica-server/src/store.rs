//! SQLite-backed stores for the build orchestrator

use async_trait::async_trait;
use fabrica_core::domain::key::SshKey;
use fabrica_runner::store::{BuildStore, KeyStore, StoreError};
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

use crate::repository::{build_repository, key_repository, log_repository};

/// Implements the runner's store traits over the server database
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildStore for SqliteStore {
    async fn append_log(&self, build_id: Uuid, text: &str) -> Result<(), StoreError> {
        log_repository::append(&self.pool, build_id, text)
            .await
            .map_err(StoreError::backend)
    }

    async fn record_container_name(&self, build_id: Uuid, name: &str) -> Result<(), StoreError> {
        build_repository::set_container(&self.pool, build_id, name)
            .await
            .map_err(StoreError::backend)
    }

    async fn record_artifact_path(&self, build_id: Uuid, path: &Path) -> Result<(), StoreError> {
        build_repository::set_download(&self.pool, build_id, &path.to_string_lossy())
            .await
            .map_err(StoreError::backend)
    }
}

#[async_trait]
impl KeyStore for SqliteStore {
    async fn get_key(&self, id: Uuid) -> Result<SshKey, StoreError> {
        key_repository::find_by_id(&self.pool, id)
            .await
            .map_err(StoreError::backend)?
            .ok_or_else(|| StoreError::NotFound(format!("key {}", id)))
    }
}
