//! Watched repository domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A repository registered with the service
///
/// Builds launched for the same URL are listed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub id: Uuid,
    pub name: String,
    pub repo: String,
    pub branch: String,
    pub key_id: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
