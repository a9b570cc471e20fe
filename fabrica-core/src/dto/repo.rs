//! Watched repository DTOs

use serde::{Deserialize, Serialize};

use super::build::default_branch;

/// Request to register a repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRepo {
    #[serde(default)]
    pub name: Option<String>,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default, rename = "keyId")]
    pub key_id: Option<String>,
}

/// Query of a repository deletion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRepo {
    /// Also delete the finished builds of the repository
    #[serde(default, rename = "deleteBuilds")]
    pub delete_builds: bool,
}
