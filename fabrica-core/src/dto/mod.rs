//! Data Transfer Objects
//!
//! Request payloads accepted by the Fabrica HTTP API.

pub mod build;
pub mod key;
pub mod repo;
