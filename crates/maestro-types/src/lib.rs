//! Shared domain types for maestro.
//!
//! This crate contains the types used across the maestro orchestration core:
//! the message envelope, module lifecycle status, node events, the error
//! taxonomy, and node configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod module;
pub mod node;
