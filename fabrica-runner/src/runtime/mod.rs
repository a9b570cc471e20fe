//! Container runtime abstraction
//!
//! The orchestrator drives containers only through `ContainerRuntime`. Every
//! call returns once the runtime has finished the operation, so from the
//! caller's point of view each step blocks until it is done.

mod podman;

pub use podman::PodmanRuntime;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::sink::{OutputSink, SinkError};

/// Readable contents of a file pulled out of a container
pub type FileStream = Box<dyn AsyncRead + Send + Unpin>;

/// Errors reported by a container runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to invoke container runtime for '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("container runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters of one in-container command
#[derive(Debug, Clone)]
pub struct ExecSpec<'a> {
    pub command: &'a [String],
    pub working_dir: &'a str,
    pub environment: &'a BTreeMap<String, String>,
}

impl ExecSpec<'_> {
    /// Command line as a single string, for logs and errors
    pub fn display(&self) -> String {
        self.command.join(" ")
    }
}

/// Capability to manage build containers
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates a container from `image` and starts it
    ///
    /// A container whose creation succeeded is left in place if starting it fails.
    async fn create_and_start(&self, name: &str, image: &str) -> Result<(), RuntimeError>;

    /// Runs a command, streaming stdout and stderr into `sink` until it exits
    async fn exec(
        &self,
        name: &str,
        spec: &ExecSpec<'_>,
        sink: &mut OutputSink,
    ) -> Result<(), RuntimeError>;

    /// Writes `content` to `path` inside the container with permission `mode`
    async fn push_file(
        &self,
        name: &str,
        path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), RuntimeError>;

    /// Opens a file inside the container for reading
    async fn pull_file(&self, name: &str, path: &str) -> Result<FileStream, RuntimeError>;

    /// Stops the container, waiting for it to halt
    async fn stop(&self, name: &str) -> Result<(), RuntimeError>;

    /// Deletes a stopped container
    async fn delete(&self, name: &str) -> Result<(), RuntimeError>;

    /// Whether `image` resolves to an image containers can be created from
    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError>;

    /// Checks that the runtime answers requests
    async fn ping(&self) -> Result<(), RuntimeError>;
}
