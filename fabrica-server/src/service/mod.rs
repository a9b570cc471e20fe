//! Service Module
//!
//! Business logic layer for the server.
//! Services orchestrate between repositories and the build runner.

pub mod build;
pub mod check;
pub mod key;
pub mod repo;

// Re-export for convenience
pub use build as build_service;
pub use check as check_service;
pub use key as key_service;
pub use repo as repo_service;
