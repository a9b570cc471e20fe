//! SSH key domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An SSH private key used to clone private repositories
///
/// `data` holds the key file base64-encoded, exactly as uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKey {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub data: String,
    pub password: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl SshKey {
    /// Whether loading this key requires a passphrase
    pub fn has_passphrase(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Listing view of a key, without key material or passphrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySummary {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub has_password: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&SshKey> for KeySummary {
    fn from(key: &SshKey) -> Self {
        Self {
            id: key.id,
            name: key.name.clone(),
            username: key.username.clone(),
            has_password: key.has_passphrase(),
            created_at: key.created_at,
        }
    }
}
