//! Core domain types
//!
//! These types represent the entities a build run works with. They are shared
//! between the runner (which produces them) and the server (which persists and
//! serves them).

pub mod build;
pub mod check;
pub mod container;
pub mod key;
pub mod log;
pub mod repo;
