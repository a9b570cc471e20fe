//! Build domain types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use super::log::LogRecord;

/// Input to one orchestration run
///
/// Immutable for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Project name; also the directory the repository is cloned into
    pub name: String,
    pub repo: String,
    pub branch: String,
    /// SSH key used for cloning, if the repository is private
    pub key_id: Option<Uuid>,
    /// Image distro, e.g. `focal`
    pub distro: String,
}

/// Build record as persisted by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: Uuid,
    pub name: String,
    pub repo: String,
    pub branch: String,
    pub distro: String,
    pub key_id: Option<Uuid>,
    pub status: BuildStatus,
    /// Container used for the run, recorded for traceability
    pub container: Option<String>,
    /// Local path of the retrieved artifact, set only on success
    pub download: Option<String>,
    /// Run duration in seconds
    pub duration: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogRecord>,
}

/// Build execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStatus {
    Queued,
    InProgress,
    Complete,
    Failed,
}

impl BuildStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Queued => "queued",
            BuildStatus::InProgress => "in-progress",
            BuildStatus::Complete => "complete",
            BuildStatus::Failed => "failed",
        }
    }

    /// Whether the build has stopped running
    pub fn is_finished(self) -> bool {
        matches!(self, BuildStatus::Complete | BuildStatus::Failed)
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(BuildStatus::Queued),
            "in-progress" => Ok(BuildStatus::InProgress),
            "complete" => Ok(BuildStatus::Complete),
            "failed" => Ok(BuildStatus::Failed),
            other => Err(format!("unknown build status: {}", other)),
        }
    }
}

/// The artifact produced by a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReference {
    /// Filename reported by the build tool, relative to the project directory
    pub declared_filename: String,
    /// Where the artifact was staged on the local filesystem
    pub local_path: PathBuf,
}

/// Derives a project name from a repository URL
///
/// Takes the last path segment and strips a trailing `.git`, so both
/// `https://host/org/app.git` and `git@host:org/app.git` give `app`.
pub fn project_name(repo: &str) -> Option<String> {
    let trimmed = repo.trim().trim_end_matches('/');
    let segment = trimmed.rsplit(['/', ':']).next()?;
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
