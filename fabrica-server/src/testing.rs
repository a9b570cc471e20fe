//! Test doubles shared by service and API tests

use async_trait::async_trait;
use fabrica_core::domain::build::Build;
use fabrica_runner::runtime::{ContainerRuntime, ExecSpec, FileStream, RuntimeError};
use fabrica_runner::sink::OutputSink;
use fabrica_runner::{BuildOrchestrator, RunnerConfig};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::service::build_service;
use crate::store::SqliteStore;

/// Container runtime that succeeds for every project except `broken`
pub struct ScriptedRuntime;

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn create_and_start(&self, _name: &str, _image: &str) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn exec(
        &self,
        _name: &str,
        spec: &ExecSpec<'_>,
        sink: &mut OutputSink,
    ) -> Result<(), RuntimeError> {
        let command = spec.display();
        if command.starts_with("ping") {
            sink.consume(b"PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n")
                .await?;
        } else if command == "snapcraft" {
            if spec.working_dir.ends_with("/broken") {
                return Err(RuntimeError::CommandFailed {
                    command,
                    exit_code: 2,
                    stderr: "Failed to build 'broken'".to_string(),
                });
            }
            let project = spec.working_dir.rsplit('/').next().unwrap_or_default();
            sink.consume(format!("Snapped {}_1.0_amd64.snap\n", project).as_bytes())
                .await?;
        }
        Ok(())
    }

    async fn push_file(
        &self,
        _name: &str,
        _path: &str,
        _content: &[u8],
        _mode: u32,
    ) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn pull_file(&self, _name: &str, _path: &str) -> Result<FileStream, RuntimeError> {
        Ok(Box::new(std::io::Cursor::new(b"snap".to_vec())))
    }

    async fn stop(&self, _name: &str) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn delete(&self, _name: &str) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Only the focal image is installed
    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        Ok(image.ends_with("-focal"))
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Orchestrator over `ScriptedRuntime` staging artifacts in a temporary directory
pub fn orchestrator(pool: &SqlitePool) -> (Arc<BuildOrchestrator>, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let config = RunnerConfig::new("fabrica".to_string(), root.path().to_path_buf());
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let orchestrator =
        BuildOrchestrator::new(Arc::new(ScriptedRuntime), store.clone(), store, Arc::new(config));
    (Arc::new(orchestrator), root)
}

/// Polls a build until its run has finished
pub async fn wait_for_build(pool: &SqlitePool, id: Uuid) -> Build {
    for _ in 0..500 {
        let build = build_service::get(pool, id).await.unwrap();
        if build.status.is_finished() {
            return build;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("build {} did not finish", id);
}
