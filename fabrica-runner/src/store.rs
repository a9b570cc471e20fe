//! Collaborator stores
//!
//! The orchestrator records progress and reads credentials through these
//! traits. The server backs them with SQLite; `MemoryStore` keeps everything
//! in process for embedding and tests.

use async_trait::async_trait;
use fabrica_core::domain::key::SshKey;
use fabrica_core::domain::log::LogRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// Build record store
///
/// Appends must be safe to call concurrently for different builds.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Appends one log record to a build
    async fn append_log(&self, build_id: Uuid, text: &str) -> Result<(), StoreError>;

    /// Records the container a build runs in
    async fn record_container_name(&self, build_id: Uuid, name: &str) -> Result<(), StoreError>;

    /// Records where the build's artifact was staged
    async fn record_artifact_path(&self, build_id: Uuid, path: &Path) -> Result<(), StoreError>;
}

/// Read-only credential store
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Fetches an SSH key, failing with `StoreError::NotFound` when unknown
    async fn get_key(&self, id: Uuid) -> Result<SshKey, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    logs: Vec<LogRecord>,
    containers: HashMap<Uuid, String>,
    artifacts: HashMap<Uuid, PathBuf>,
    keys: HashMap<Uuid, SshKey>,
}

/// In-memory implementation of `BuildStore` and `KeyStore`
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key that later lookups can find
    pub fn insert_key(&self, key: SshKey) {
        let mut state = self.state.lock().unwrap();
        state.keys.insert(key.id, key);
    }

    /// Log messages recorded for a build, in append order
    pub fn logs(&self, build_id: Uuid) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .logs
            .iter()
            .filter(|record| record.build_id == build_id)
            .map(|record| record.message.clone())
            .collect()
    }

    pub fn container_name(&self, build_id: Uuid) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.containers.get(&build_id).cloned()
    }

    pub fn artifact_path(&self, build_id: Uuid) -> Option<PathBuf> {
        let state = self.state.lock().unwrap();
        state.artifacts.get(&build_id).cloned()
    }
}

#[async_trait]
impl BuildStore for MemoryStore {
    async fn append_log(&self, build_id: Uuid, text: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.logs.push(LogRecord::new(build_id, text));
        Ok(())
    }

    async fn record_container_name(&self, build_id: Uuid, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.containers.insert(build_id, name.to_string());
        Ok(())
    }

    async fn record_artifact_path(&self, build_id: Uuid, path: &Path) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.artifacts.insert(build_id, path.to_path_buf());
        Ok(())
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn get_key(&self, id: Uuid) -> Result<SshKey, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .keys
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("key {}", id)))
    }
}
