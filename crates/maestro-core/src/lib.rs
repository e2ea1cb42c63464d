//! Module orchestration and message routing core for maestro.
//!
//! A [`node::Node`] owns a set of independently-lifecycled [`module::Module`]s,
//! resolves their startup order from declared dependencies, and routes
//! [`maestro_types::envelope::Envelope`]s between them -- tracking metrics,
//! emitting events, and containing failures at the single dispatch point.
//!
//! Modules never call each other directly: all cross-module interaction goes
//! through the node.

pub mod config;
pub mod metrics;
pub mod module;
pub mod node;
pub mod resolver;
