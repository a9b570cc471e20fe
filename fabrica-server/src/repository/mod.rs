//! Repository Module
//!
//! Data access layer for the server.
//! Each repository handles database operations for a specific domain entity.

pub mod build;
pub mod key;
pub mod log;
pub mod repo;

// Re-export for convenience
pub use build as build_repository;
pub use key as key_repository;
pub use log as log_repository;
pub use repo as repo_repository;
