//! Fabrica Core
//!
//! Core types shared by the Fabrica build runner and server.
//!
//! This crate contains:
//! - Domain types: builds, build logs, containers, SSH keys, watched
//!   repositories and environment checks
//! - DTOs: request payloads accepted by the HTTP API

pub mod domain;
pub mod dto;
