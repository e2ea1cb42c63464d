//! Event types for the maestro node event bus.
//!
//! `NodeEvent` is the unified event type broadcast during routing and module
//! lifecycle transitions. All variants are Clone + Send + Sync for use with
//! tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::module::ModuleStatus;

/// Events emitted by the node and its modules.
///
/// Subscribers (logging, dashboards, peer modules) observe these out of
/// band; emission never blocks or fails dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// An envelope was dispatched successfully.
    MessageRouted {
        id: Uuid,
        trace_id: Uuid,
        sender: String,
        recipient: String,
        action: String,
        latency_ms: u64,
    },

    /// An envelope failed to dispatch (lookup, capability, or handler).
    RoutingError {
        id: Uuid,
        sender: String,
        recipient: String,
        action: String,
        error: String,
    },

    /// A module's capability handler completed successfully.
    ModuleExecuted {
        module: String,
        action: String,
        duration_ms: u64,
    },

    /// A module failed -- during a handler invocation or during setup.
    ModuleError {
        module: String,
        /// The action being executed, or `None` for lifecycle failures.
        action: Option<String>,
        error: String,
    },

    /// A module's lifecycle status changed.
    StatusChanged {
        module: String,
        status: ModuleStatus,
    },

    /// A module finished initialization and became active.
    ModuleInitialized { module: String },

    /// The backlog was full; the oldest queued envelope was dropped.
    QueueOverflow {
        dropped_id: Uuid,
        queue_capacity: usize,
    },
}

impl NodeEvent {
    /// Returns the module name from module-scoped variants, or `None` for
    /// routing-scoped and queue-scoped events.
    pub fn module(&self) -> Option<&str> {
        match self {
            NodeEvent::ModuleExecuted { module, .. }
            | NodeEvent::ModuleError { module, .. }
            | NodeEvent::StatusChanged { module, .. }
            | NodeEvent::ModuleInitialized { module } => Some(module),

            NodeEvent::MessageRouted { .. }
            | NodeEvent::RoutingError { .. }
            | NodeEvent::QueueOverflow { .. } => None,
        }
    }
}
