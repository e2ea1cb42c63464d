//! Error taxonomy for the maestro orchestration core.
//!
//! One enum per concern: routing, module lifecycle, registration, and
//! dependency resolution. Handler and setup failures wrap the underlying
//! `anyhow::Error` as a source so callers keep the full chain.

use thiserror::Error;

use crate::module::ModuleStatus;

/// Errors surfaced by `route()` and capability execution.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The recipient is not registered with the node.
    #[error("recipient module not found: {0}")]
    ModuleNotFound(String),

    /// The recipient does not expose the requested action.
    #[error("module '{module}' does not expose action '{action}'")]
    UnsupportedAction { module: String, action: String },

    /// The recipient is in a lifecycle state that cannot execute.
    #[error("cannot execute on module '{module}': module is {status}")]
    ModuleNotActive {
        module: String,
        status: ModuleStatus,
    },

    /// The capability's own handler failed.
    #[error("handler failed on '{module}:{action}': {source}")]
    Handler {
        module: String,
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// Dispatch exceeded the configured route timeout.
    #[error("dispatch to '{module}:{action}' timed out after {elapsed_ms}ms")]
    Timeout {
        module: String,
        action: String,
        elapsed_ms: u64,
    },

    /// The outbound sender is detached (module deregistered or node dropped).
    #[error("module is not attached to a node")]
    NodeUnavailable,
}

/// Errors from module lifecycle transitions.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A declared dependency was not healthy at initialization time.
    #[error("module '{module}': dependency '{dependency}' is not healthy")]
    DependencyUnhealthy { module: String, dependency: String },

    /// Module-specific setup failed during initialization.
    #[error("module '{module}' failed to initialize: {source}")]
    Setup {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    /// The requested transition is not valid from the current state.
    #[error("module '{module}': invalid transition {from} -> {to}")]
    InvalidTransition {
        module: String,
        from: ModuleStatus,
        to: ModuleStatus,
    },
}

/// Errors from node registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A module with this name is already registered.
    #[error("module name '{0}' is already registered")]
    DuplicateName(String),
}

/// Errors from dependency-order resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected involving module '{0}'")]
    CycleDetected(String),

    /// A module declares a dependency that is not registered.
    #[error("module '{module}' depends on unknown module '{dependency}'")]
    UnknownDependency { module: String, dependency: String },
}

/// Umbrella error for node startup, spanning resolution and module init.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
