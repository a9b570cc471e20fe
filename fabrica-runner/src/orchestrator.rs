//! Build orchestrator
//!
//! Runs one build from start to finish in its own container:
//! 1. Create and start the container
//! 2. Wait for its network
//! 3. Install SSH defaults and, if requested, the SSH key
//! 4. Install prerequisites and clone the repository
//! 5. Run the build tool
//! 6. Copy the artifact out and remove the container
//!
//! Steps run strictly in order. The first failure ends the run; the container
//! is then removed unless debug mode asks for it to be kept.

use fabrica_core::domain::build::{ArtifactReference, BuildRequest};
use fabrica_core::domain::container::ContainerState;
use fabrica_core::domain::log::milestone;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clone::{CLONE_SCRIPT_MODE, CLONE_SCRIPT_PATH, clone_script};
use crate::config::RunnerConfig;
use crate::credentials::{CredentialProvisioner, ProvisionError};
use crate::error::{BuildError, Result, RetrievalError};
use crate::network::wait_for_network;
use crate::runtime::{ContainerRuntime, ExecSpec, RuntimeError};
use crate::sink::OutputSink;
use crate::store::{BuildStore, KeyStore};

const SSH_DIR: &str = "/root/.ssh";
const SSH_CONFIG_PATH: &str = "/root/.ssh/config";
const SSH_CONFIG_MODE: u32 = 0o644;

/// The container owned by one run
#[derive(Debug)]
struct ContainerHandle {
    name: String,
    state: ContainerState,
}

impl ContainerHandle {
    fn transition(&mut self, state: ContainerState) {
        debug!("Container {}: {:?} -> {:?}", self.name, self.state, state);
        self.state = state;
    }
}

/// Drives build runs against a container runtime
pub struct BuildOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    builds: Arc<dyn BuildStore>,
    provisioner: CredentialProvisioner,
    config: Arc<RunnerConfig>,
}

impl BuildOrchestrator {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        builds: Arc<dyn BuildStore>,
        keys: Arc<dyn KeyStore>,
        config: Arc<RunnerConfig>,
    ) -> Self {
        let provisioner = CredentialProvisioner::new(runtime.clone(), keys);
        Self {
            runtime,
            builds,
            provisioner,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime.as_ref()
    }

    /// Runs one build end to end
    ///
    /// Progress and errors are written to the build's log. On success the
    /// artifact has been staged locally and its path recorded.
    pub async fn run_build(
        &self,
        build_id: Uuid,
        request: &BuildRequest,
    ) -> Result<ArtifactReference> {
        info!(
            "Run build {}: {} {} ({})",
            build_id, request.name, request.repo, request.distro
        );
        self.milestone(build_id, "Creating and starting container")
            .await;

        let debug = self.config.debug;

        let mut container = ContainerHandle {
            name: self.config.container_name(&request.name),
            state: ContainerState::Absent,
        };
        if let Err(e) = self
            .builds
            .record_container_name(build_id, &container.name)
            .await
        {
            warn!("Failed to record container for build {}: {}", build_id, e);
        }

        self.milestone(build_id, format!("Create container {}", container.name))
            .await;
        let image = self.config.image_alias(&request.distro);
        if let Err(source) = self.runtime.create_and_start(&container.name, &image).await {
            let err = BuildError::Lifecycle {
                container: container.name.clone(),
                source,
            };
            error!("Error creating/starting container: {}", err);
            self.log(build_id, &err.to_string()).await;
            return Err(err);
        }
        container.transition(ContainerState::Running);

        match self.run_steps(build_id, request, &container).await {
            Ok(artifact) => {
                if let Err(e) = self
                    .builds
                    .record_artifact_path(build_id, &artifact.local_path)
                    .await
                {
                    warn!("Failed to record artifact for build {}: {}", build_id, e);
                }

                self.remove_container(build_id, &mut container).await?;
                info!("Build {} completed: {}", build_id, artifact.local_path.display());
                Ok(artifact)
            }
            Err(err) => {
                error!("Build {} failed ({}): {}", build_id, err.kind(), err);
                self.log(build_id, &err.to_string()).await;

                if debug {
                    self.milestone(
                        build_id,
                        format!("Debug mode: keeping container {}", container.name),
                    )
                    .await;
                } else {
                    // The triggering error wins over any cleanup failure
                    let _ = self.remove_container(build_id, &mut container).await;
                }
                Err(err)
            }
        }
    }

    /// Everything between a running container and a staged artifact
    async fn run_steps(
        &self,
        build_id: Uuid,
        request: &BuildRequest,
        container: &ContainerHandle,
    ) -> Result<ArtifactReference> {
        let name = container.name.as_str();

        self.milestone(build_id, "Waiting for the network").await;
        wait_for_network(self.runtime.as_ref(), name, &self.config).await;
        self.milestone(build_id, "Network is ready").await;

        let mut log_sink = OutputSink::persist(build_id, self.builds.clone());

        self.setup_ssh_config(name, &mut log_sink).await?;

        if request.key_id.is_some() {
            self.milestone(build_id, "Install ssh key").await;
        }
        let passphrase_required = self.provisioner.provision(name, request.key_id).await?;

        let script = clone_script(&request.repo, &request.branch, passphrase_required);
        self.runtime
            .push_file(name, CLONE_SCRIPT_PATH, script.as_bytes(), CLONE_SCRIPT_MODE)
            .await
            .map_err(|source| ProvisionError::Push {
                path: CLONE_SCRIPT_PATH.to_string(),
                source,
            })?;

        self.milestone(build_id, "Install dependencies").await;
        let clone_command = vec![CLONE_SCRIPT_PATH.to_string()];
        for command in self
            .config
            .prerequisites
            .iter()
            .chain(std::iter::once(&clone_command))
        {
            self.milestone(build_id, command.join(" ")).await;
            self.run_in_container(name, command, None, &mut log_sink)
                .await?;
        }

        let project_dir = self.config.project_dir(&request.name);
        let mut artifact_sink = OutputSink::artifact(
            build_id,
            self.builds.clone(),
            &self.config.artifact_marker,
        );
        self.milestone(build_id, "Build snap").await;
        self.run_in_container(
            name,
            &self.config.build_command,
            Some(&project_dir),
            &mut artifact_sink,
        )
        .await?;

        let declared = artifact_sink
            .artifact_filename()
            .ok_or(RetrievalError::NotReported)?
            .to_string();
        self.milestone(build_id, format!("Download file {}", declared))
            .await;

        let local_path = self
            .retrieve_artifact(build_id, name, &project_dir, &declared)
            .await?;

        Ok(ArtifactReference {
            declared_filename: declared,
            local_path,
        })
    }

    /// Pushes SSH client defaults so git can reach its remotes reliably
    async fn setup_ssh_config(&self, container: &str, sink: &mut OutputSink) -> Result<()> {
        for command in [
            vec!["mkdir".to_string(), "-p".to_string(), SSH_DIR.to_string()],
            vec!["chmod".to_string(), "700".to_string(), SSH_DIR.to_string()],
        ] {
            self.exec(container, &command, None, sink)
                .await
                .map_err(|source| ProvisionError::SshConfig { source })?;
        }

        self.runtime
            .push_file(
                container,
                SSH_CONFIG_PATH,
                self.config.ssh_config.as_bytes(),
                SSH_CONFIG_MODE,
            )
            .await
            .map_err(|source| ProvisionError::Push {
                path: SSH_CONFIG_PATH.to_string(),
                source,
            })?;

        Ok(())
    }

    /// Copies the artifact into the build's local directory
    async fn retrieve_artifact(
        &self,
        build_id: Uuid,
        container: &str,
        project_dir: &str,
        declared: &str,
    ) -> std::result::Result<PathBuf, RetrievalError> {
        let file_name = Path::new(declared)
            .file_name()
            .ok_or_else(|| RetrievalError::InvalidFilename(declared.to_string()))?;
        // Reported paths are relative to the project, even with a leading slash
        let source = Path::new(project_dir)
            .join(declared.trim_start_matches('/'))
            .to_string_lossy()
            .into_owned();

        let dir = self.config.artifact_dir(build_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| RetrievalError::Write {
                path: dir.clone(),
                source,
            })?;
        let destination = dir.join(file_name);

        info!("Copy file from: {}", source);
        let mut content = self
            .runtime
            .pull_file(container, &source)
            .await
            .map_err(|e| RetrievalError::Pull {
                path: source.clone(),
                source: e,
            })?;

        let write_error = |source: std::io::Error| RetrievalError::Write {
            path: destination.clone(),
            source,
        };
        let mut file = tokio::fs::File::create(&destination)
            .await
            .map_err(write_error)?;
        tokio::io::copy(&mut content, &mut file)
            .await
            .map_err(write_error)?;
        file.flush().await.map_err(write_error)?;

        Ok(destination)
    }

    /// Stops and deletes the container, logging any failure to the build
    async fn remove_container(
        &self,
        build_id: Uuid,
        container: &mut ContainerHandle,
    ) -> Result<()> {
        if !container.state.exists() {
            return Ok(());
        }

        self.milestone(build_id, format!("Removing container {}", container.name))
            .await;

        let result = match self.runtime.stop(&container.name).await {
            Ok(()) => {
                container.transition(ContainerState::Stopped);
                self.runtime.delete(&container.name).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                container.transition(ContainerState::Deleted);
                Ok(())
            }
            Err(source) => {
                let err = BuildError::Lifecycle {
                    container: container.name.clone(),
                    source,
                };
                error!("Failed to remove container: {}", err);
                self.log(build_id, &err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Runs a pipeline command, mapping failure to an execution error
    async fn run_in_container(
        &self,
        container: &str,
        command: &[String],
        working_dir: Option<&str>,
        sink: &mut OutputSink,
    ) -> Result<()> {
        self.exec(container, command, working_dir, sink)
            .await
            .map_err(|source| BuildError::Execution {
                command: command.join(" "),
                source,
            })
    }

    async fn exec(
        &self,
        container: &str,
        command: &[String],
        working_dir: Option<&str>,
        sink: &mut OutputSink,
    ) -> std::result::Result<(), RuntimeError> {
        let spec = ExecSpec {
            command,
            working_dir: working_dir.unwrap_or(&self.config.home_dir),
            environment: &self.config.environment,
        };
        self.runtime.exec(container, &spec, sink).await
    }

    async fn milestone(&self, build_id: Uuid, text: impl AsRef<str>) {
        info!("Build {}: {}", build_id, text.as_ref());
        self.log(build_id, &milestone(text)).await;
    }

    /// Appends to the build log; a failing log store never stops the build
    async fn log(&self, build_id: Uuid, text: &str) {
        if let Err(e) = self.builds.append_log(build_id, text).await {
            warn!("Failed to append log for build {}: {}", build_id, e);
        }
    }
}
