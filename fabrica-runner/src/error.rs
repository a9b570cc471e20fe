//! Build run errors
//!
//! Every variant ends the run that raised it.

use std::path::PathBuf;
use thiserror::Error;

use crate::credentials::ProvisionError;
use crate::runtime::RuntimeError;

/// Result type alias for build runs
pub type Result<T> = std::result::Result<T, BuildError>;

/// Errors that stop a build run
#[derive(Debug, Error)]
pub enum BuildError {
    /// Creating, starting, stopping or deleting the container failed
    #[error("container {container}: {source}")]
    Lifecycle {
        container: String,
        #[source]
        source: RuntimeError,
    },

    /// An in-container command failed or could not be run
    #[error("command '{command}' failed: {source}")]
    Execution {
        command: String,
        #[source]
        source: RuntimeError,
    },

    /// Credentials or configuration could not be installed
    #[error(transparent)]
    Provisioning(#[from] ProvisionError),

    /// The artifact could not be brought back from the container
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

impl BuildError {
    /// Short name of the error kind, for logs and status reporting
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::Lifecycle { .. } => "lifecycle",
            BuildError::Execution { .. } => "execution",
            BuildError::Provisioning(_) => "provisioning",
            BuildError::Retrieval(_) => "retrieval",
        }
    }
}

/// Reasons the artifact could not be retrieved
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("the build did not report an artifact")]
    NotReported,

    #[error("invalid artifact filename '{0}'")]
    InvalidFilename(String),

    #[error("error fetching {path}: {source}")]
    Pull {
        path: String,
        #[source]
        source: RuntimeError,
    },

    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_message_includes_failure() {
        let err = BuildError::Execution {
            command: "snapcraft".to_string(),
            source: RuntimeError::CommandFailed {
                command: "snapcraft".to_string(),
                exit_code: 2,
                stderr: "Failed to build 'myapp'".to_string(),
            },
        };

        let message = err.to_string();
        assert!(message.contains("snapcraft"));
        assert!(message.contains("exit code 2"));
        assert!(message.contains("Failed to build 'myapp'"));
        assert_eq!(err.kind(), "execution");
    }

    #[test]
    fn test_retrieval_is_transparent() {
        let err = BuildError::from(RetrievalError::NotReported);
        assert_eq!(err.to_string(), "the build did not report an artifact");
        assert_eq!(err.kind(), "retrieval");
    }
}
