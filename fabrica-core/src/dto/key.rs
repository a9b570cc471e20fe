//! SSH key DTOs

use serde::{Deserialize, Serialize};

/// Request to register an SSH key
///
/// `data` is the private key file base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKey {
    pub name: String,
    #[serde(default)]
    pub username: String,
    pub data: String,
    #[serde(default)]
    pub password: Option<String>,
}
