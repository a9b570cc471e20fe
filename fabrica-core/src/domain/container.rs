//! Container domain types

use serde::{Deserialize, Serialize};

/// Lifecycle state of a build container
///
/// A container only moves forward: `Absent -> Created -> Running -> Stopped -> Deleted`.
/// A failed step may leave it frozen at any point when debugging is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerState {
    Absent,
    Created,
    Running,
    Stopped,
    Deleted,
}

impl ContainerState {
    /// Whether the runtime still holds resources for this container
    pub fn exists(self) -> bool {
        matches!(
            self,
            ContainerState::Created | ContainerState::Running | ContainerState::Stopped
        )
    }
}
