//! Build DTOs

use serde::{Deserialize, Serialize};

/// Request to start a new build
///
/// `name` defaults to the repository name and an empty `key_id` means the
/// repository is cloned without credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBuild {
    #[serde(default)]
    pub name: Option<String>,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default, rename = "keyId")]
    pub key_id: Option<String>,
    pub distro: String,
}

pub(crate) fn default_branch() -> String {
    "master".to_string()
}
