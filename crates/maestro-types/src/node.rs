//! Node status and introspection snapshot types.
//!
//! These are the read-only records returned by the node's status queries.
//! Operational tooling consumes them as JSON; nothing here is mutated by
//! callers.

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::module::ModuleSummary;

/// Lifecycle state of a router node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Initializing,
    Ready,
    Processing,
    ShuttingDown,
    Shutdown,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeStatus::Initializing => "initializing",
            NodeStatus::Ready => "ready",
            NodeStatus::Processing => "processing",
            NodeStatus::ShuttingDown => "shutting_down",
            NodeStatus::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Aggregate routing metrics for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Envelopes dispatched successfully.
    pub messages_routed: u64,
    /// Approximate serialized bytes of successfully routed envelopes.
    pub bytes_transferred: u64,
    /// Mean dispatch latency in milliseconds (0.0 when nothing routed yet).
    pub avg_latency_ms: f64,
    /// Milliseconds since the node's metrics started.
    pub uptime_ms: u64,
}

/// One module's health verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub module: String,
    pub healthy: bool,
}

/// Full status snapshot of a node and its modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub node_status: NodeStatus,
    pub total_modules: usize,
    pub modules: Vec<ModuleSummary>,
    pub metrics: MetricsSnapshot,
    pub queue_depth: usize,
}

/// Snapshot of the backlog queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub depth: usize,
    pub capacity: usize,
    pub percent_full: f64,
    /// Up to the first ten queued envelopes, oldest first.
    pub head: Vec<Envelope>,
}
