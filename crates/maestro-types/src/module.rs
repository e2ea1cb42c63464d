//! Module lifecycle status and introspection records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a module.
///
/// Valid transitions: `Uninitialized -> Initializing -> Active <-> Paused`,
/// any state `-> Error` on unrecoverable failure, any non-terminal state
/// `-> Shutdown`. `Shutdown` is terminal; `Error` is not retried
/// automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Uninitialized,
    Initializing,
    Active,
    Paused,
    Error,
    Shutdown,
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModuleStatus::Uninitialized => "uninitialized",
            ModuleStatus::Initializing => "initializing",
            ModuleStatus::Active => "active",
            ModuleStatus::Paused => "paused",
            ModuleStatus::Error => "error",
            ModuleStatus::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Point-in-time snapshot of a module's execution metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleMetricsSnapshot {
    /// Total capability invocations.
    pub calls: u64,
    /// Invocations whose handler failed.
    pub errors: u64,
    /// Cumulative handler time in milliseconds.
    pub total_time_ms: u64,
    /// Mean handler time in milliseconds (0.0 when no calls yet).
    pub avg_time_ms: f64,
    /// Message of the most recent failure, if any.
    pub last_error: Option<String>,
}

/// Read-only summary of a module, as reported by status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSummary {
    /// Stable module ID (UUIDv7, assigned at construction).
    pub id: Uuid,
    /// Registry name (primary key for routing).
    pub name: String,
    /// Current lifecycle state.
    pub status: ModuleStatus,
    /// Whether the module currently reports healthy.
    pub healthy: bool,
    /// When the module was constructed.
    pub created_at: DateTime<Utc>,
    /// Execution metrics.
    pub metrics: ModuleMetricsSnapshot,
    /// Names of the actions this module exposes.
    pub capabilities: Vec<String>,
}
