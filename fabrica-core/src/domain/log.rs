//! Build log domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix marking a log record as a pipeline milestone
pub const MILESTONE_PREFIX: &str = "milestone: ";

/// One line of build output or progress
///
/// Records are append-only and ordered by `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub build_id: Uuid,
    pub message: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl LogRecord {
    pub fn new(build_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            build_id,
            message: message.into(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Whether this record was emitted as a milestone rather than tool output
    pub fn is_milestone(&self) -> bool {
        self.message.starts_with(MILESTONE_PREFIX)
    }
}

/// Formats a milestone message
pub fn milestone(text: impl AsRef<str>) -> String {
    format!("{}{}", MILESTONE_PREFIX, text.as_ref())
}
