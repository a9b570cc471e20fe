//! Fabrica Runner
//!
//! Executes snap builds inside disposable containers.
//!
//! This crate contains:
//! - Runtime: the container capability and its Podman implementation
//! - Sinks: destinations for in-container command output
//! - Stores: persistence seams for build records, logs and SSH keys
//! - Orchestrator: the build pipeline from container creation to artifact
//! - Checks: image and runtime availability reported by the server

pub mod check;
pub mod clone;
pub mod config;
pub mod credentials;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod runtime;
pub mod sink;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::RunnerConfig;
pub use error::{BuildError, RetrievalError};
pub use orchestrator::BuildOrchestrator;
pub use runtime::{ContainerRuntime, PodmanRuntime};
pub use store::{BuildStore, KeyStore, MemoryStore, StoreError};
