//! The `Module` runtime: lifecycle state machine, capability execution, and
//! per-module metrics.
//!
//! A module is built once with [`ModuleBuilder`], registered with exactly one
//! node, and driven through `Uninitialized -> Initializing -> Active <-> Paused`
//! with `Error` and terminal `Shutdown` off-ramps. Metrics are owned and
//! mutated only by the module itself; the node reads snapshots.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use maestro_types::envelope::Envelope;
use maestro_types::error::{LifecycleError, RouteError};
use maestro_types::event::NodeEvent;
use maestro_types::module::{ModuleMetricsSnapshot, ModuleStatus, ModuleSummary};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::behavior::{Behavior, BoxBehavior, NoopBehavior};
use super::capability::{Capability, CapabilitySet};
use super::outbound::{Outbound, RouteOutcome};

/// Execution counters for one module.
struct ModuleMetrics {
    calls: AtomicU64,
    errors: AtomicU64,
    total_time_ms: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ModuleMetrics {
    fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_time_ms: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    fn snapshot(&self) -> ModuleMetricsSnapshot {
        let calls = self.calls.load(Ordering::Relaxed);
        let total_time_ms = self.total_time_ms.load(Ordering::Relaxed);
        ModuleMetricsSnapshot {
            calls,
            errors: self.errors.load(Ordering::Relaxed),
            total_time_ms,
            avg_time_ms: if calls > 0 {
                total_time_ms as f64 / calls as f64
            } else {
                0.0
            },
            last_error: self.last_error.lock().unwrap().clone(),
        }
    }
}

/// An independently-lifecycled unit exposing named capabilities.
pub struct Module {
    id: Uuid,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    dependencies: Vec<String>,
    capabilities: CapabilitySet,
    behavior: BoxBehavior,
    status: RwLock<ModuleStatus>,
    healthy: AtomicBool,
    metrics: ModuleMetrics,
    outbound: RwLock<Option<Arc<dyn Outbound>>>,
}

impl Module {
    /// Start building a module with the given registry name.
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder::new(name)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Registry name -- the primary key for routing.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Names of modules that must be healthy before this one initializes.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn status(&self) -> ModuleStatus {
        *self.status.read().unwrap()
    }

    /// Lifecycle-derived health flag (set on activation, cleared on error
    /// and shutdown). For the deeper probe see [`Module::health_check`].
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Attach the outbound sender. Called by the node at registration.
    pub fn attach(&self, outbound: Arc<dyn Outbound>) {
        *self.outbound.write().unwrap() = Some(outbound);
    }

    /// Detach the outbound sender. Called by the node at deregistration.
    pub fn detach(&self) {
        *self.outbound.write().unwrap() = None;
    }

    /// Initialize the module.
    ///
    /// Transitions `Uninitialized -> Initializing`, gates on every resolved
    /// dependency reporting healthy, then runs the behavior's `setup()`.
    /// Success lands in `Active`; any failure lands in `Error` and
    /// propagates to the caller.
    pub async fn initialize(&self, dependencies: &[Arc<Module>]) -> Result<(), LifecycleError> {
        let current = self.status();
        if current != ModuleStatus::Uninitialized {
            return Err(LifecycleError::InvalidTransition {
                module: self.name.clone(),
                from: current,
                to: ModuleStatus::Initializing,
            });
        }

        self.set_status(ModuleStatus::Initializing);

        for dep in dependencies {
            if !dep.is_healthy() {
                self.record_failure(format!("dependency '{}' is not healthy", dep.name()), None);
                return Err(LifecycleError::DependencyUnhealthy {
                    module: self.name.clone(),
                    dependency: dep.name().to_string(),
                });
            }
        }

        match self.behavior.setup().await {
            Ok(()) => {
                self.healthy.store(true, Ordering::SeqCst);
                self.set_status(ModuleStatus::Active);
                self.publish(NodeEvent::ModuleInitialized {
                    module: self.name.clone(),
                });
                info!(module = %self.name, "module initialized");
                Ok(())
            }
            Err(err) => {
                self.record_failure(err.to_string(), None);
                Err(LifecycleError::Setup {
                    module: self.name.clone(),
                    source: err,
                })
            }
        }
    }

    /// Execute one of this module's capabilities.
    ///
    /// Requires `Active`; rejects unknown actions. Both checks happen before
    /// any metric is touched. Handler failures update error metrics and are
    /// re-raised -- never swallowed.
    pub async fn execute(
        &self,
        action: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, RouteError> {
        let status = self.status();
        if status != ModuleStatus::Active {
            return Err(RouteError::ModuleNotActive {
                module: self.name.clone(),
                status,
            });
        }

        let Some(capability) = self.capabilities.get(action) else {
            return Err(RouteError::UnsupportedAction {
                module: self.name.clone(),
                action: action.to_string(),
            });
        };

        self.metrics.calls.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        match capability.invoke(payload).await {
            Ok(result) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.metrics
                    .total_time_ms
                    .fetch_add(duration_ms, Ordering::Relaxed);
                self.publish(NodeEvent::ModuleExecuted {
                    module: self.name.clone(),
                    action: action.to_string(),
                    duration_ms,
                });
                Ok(result)
            }
            Err(err) => {
                self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                *self.metrics.last_error.lock().unwrap() = Some(err.to_string());
                self.publish(NodeEvent::ModuleError {
                    module: self.name.clone(),
                    action: Some(action.to_string()),
                    error: err.to_string(),
                });
                Err(RouteError::Handler {
                    module: self.name.clone(),
                    action: action.to_string(),
                    source: err,
                })
            }
        }
    }

    /// Pause an `Active` module. A paused module rejects execution but keeps
    /// its health flag (it is suspended, not broken).
    pub fn pause(&self) -> Result<(), LifecycleError> {
        let current = self.status();
        if current != ModuleStatus::Active {
            return Err(LifecycleError::InvalidTransition {
                module: self.name.clone(),
                from: current,
                to: ModuleStatus::Paused,
            });
        }
        self.set_status(ModuleStatus::Paused);
        debug!(module = %self.name, "module paused");
        Ok(())
    }

    /// Resume a `Paused` module back to `Active`.
    pub fn resume(&self) -> Result<(), LifecycleError> {
        let current = self.status();
        if current != ModuleStatus::Paused {
            return Err(LifecycleError::InvalidTransition {
                module: self.name.clone(),
                from: current,
                to: ModuleStatus::Active,
            });
        }
        self.set_status(ModuleStatus::Active);
        debug!(module = %self.name, "module resumed");
        Ok(())
    }

    /// Shut the module down. Terminal and idempotent.
    ///
    /// The transition to `Shutdown` happens regardless of the behavior's
    /// `cleanup()` outcome; a cleanup failure is returned so the caller can
    /// log it, but the module is unhealthy and terminal either way.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        if self.status() == ModuleStatus::Shutdown {
            return Ok(());
        }

        self.healthy.store(false, Ordering::SeqCst);
        self.set_status(ModuleStatus::Shutdown);

        let result = self.behavior.cleanup().await;
        if let Err(err) = &result {
            *self.metrics.last_error.lock().unwrap() = Some(err.to_string());
            warn!(module = %self.name, error = %err, "module cleanup failed");
        } else {
            info!(module = %self.name, "module shut down");
        }
        result
    }

    /// Combined health verdict: the lifecycle flag AND the behavior's probe.
    pub async fn health_check(&self) -> bool {
        self.is_healthy() && self.behavior.health_check().await
    }

    /// Send an envelope to another module through the owning node.
    pub async fn send(
        &self,
        recipient: impl Into<String>,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<RouteOutcome, RouteError> {
        let outbound = self
            .outbound
            .read()
            .unwrap()
            .clone()
            .ok_or(RouteError::NodeUnavailable)?;
        let envelope = Envelope::new(self.name.clone(), recipient, action, payload);
        outbound.deliver(envelope).await
    }

    /// Read-only summary for status queries.
    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary {
            id: self.id,
            name: self.name.clone(),
            status: self.status(),
            healthy: self.is_healthy(),
            created_at: self.created_at,
            metrics: self.metrics.snapshot(),
            capabilities: self.capabilities.names(),
        }
    }

    /// Snapshot of this module's execution metrics.
    pub fn metrics(&self) -> ModuleMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn set_status(&self, status: ModuleStatus) {
        *self.status.write().unwrap() = status;
        self.publish(NodeEvent::StatusChanged {
            module: self.name.clone(),
            status,
        });
    }

    /// Mark the module failed: `Error` state, unhealthy, error recorded and
    /// published.
    fn record_failure(&self, error: String, action: Option<String>) {
        self.healthy.store(false, Ordering::SeqCst);
        *self.metrics.last_error.lock().unwrap() = Some(error.clone());
        self.set_status(ModuleStatus::Error);
        self.publish(NodeEvent::ModuleError {
            module: self.name.clone(),
            action,
            error,
        });
    }

    fn publish(&self, event: NodeEvent) {
        if let Some(outbound) = self.outbound.read().unwrap().as_ref() {
            outbound.publish(event);
        }
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("status", &self.status())
            .field("capabilities", &self.capabilities.len())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Builder for [`Module`]. The capability table and dependency list are
/// frozen at `build()`.
pub struct ModuleBuilder {
    name: String,
    description: String,
    dependencies: Vec<String>,
    capabilities: CapabilitySet,
    behavior: BoxBehavior,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            dependencies: Vec::new(),
            capabilities: CapabilitySet::new(),
            behavior: BoxBehavior::new(NoopBehavior),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a dependency on another module by registry name.
    pub fn dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Expose an action under the given name.
    pub fn capability(mut self, action: impl Into<String>, capability: Capability) -> Self {
        self.capabilities.insert(action, capability);
        self
    }

    /// Install module-specific lifecycle hooks.
    pub fn behavior<T: Behavior + 'static>(mut self, behavior: T) -> Self {
        self.behavior = BoxBehavior::new(behavior);
        self
    }

    pub fn build(self) -> Arc<Module> {
        Arc::new(Module {
            id: Uuid::now_v7(),
            name: self.name,
            description: self.description,
            created_at: Utc::now(),
            dependencies: self.dependencies,
            capabilities: self.capabilities,
            behavior: self.behavior,
            status: RwLock::new(ModuleStatus::Uninitialized),
            healthy: AtomicBool::new(false),
            metrics: ModuleMetrics::new(),
            outbound: RwLock::new(None),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::outbound::fake::FakeOutbound;
    use serde_json::json;

    fn ping_module() -> Arc<Module> {
        Module::builder("pinger")
            .description("answers pings")
            .capability(
                "ping",
                Capability::new("reply with pong", |_| async { Ok(json!({"pong": true})) }),
            )
            .capability(
                "fail",
                Capability::new("always fails", |_| async {
                    Err(anyhow::anyhow!("handler exploded"))
                }),
            )
            .build()
    }

    #[tokio::test]
    async fn initialize_transitions_to_active() {
        let module = ping_module();
        assert_eq!(module.status(), ModuleStatus::Uninitialized);

        module.initialize(&[]).await.unwrap();
        assert_eq!(module.status(), ModuleStatus::Active);
        assert!(module.is_healthy());
    }

    #[tokio::test]
    async fn initialize_twice_is_invalid() {
        let module = ping_module();
        module.initialize(&[]).await.unwrap();
        let err = module.initialize(&[]).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn initialize_rejects_unhealthy_dependency() {
        let dep = Module::builder("storage").build(); // never initialized
        let module = Module::builder("api").dependency("storage").build();

        let err = module.initialize(&[dep]).await.unwrap_err();
        assert!(matches!(err, LifecycleError::DependencyUnhealthy { .. }));
        assert_eq!(module.status(), ModuleStatus::Error);
        assert!(!module.is_healthy());
    }

    struct FailingSetup;

    impl Behavior for FailingSetup {
        async fn setup(&self) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("no database"))
        }
    }

    #[tokio::test]
    async fn setup_failure_lands_in_error_state() {
        let module = Module::builder("db").behavior(FailingSetup).build();
        let err = module.initialize(&[]).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Setup { .. }));
        assert_eq!(module.status(), ModuleStatus::Error);
        assert_eq!(
            module.metrics().last_error.as_deref(),
            Some("no database")
        );
    }

    #[tokio::test]
    async fn execute_returns_handler_result_and_counts() {
        let module = ping_module();
        module.initialize(&[]).await.unwrap();

        let result = module.execute("ping", json!({})).await.unwrap();
        assert_eq!(result["pong"], true);

        let metrics = module.metrics();
        assert_eq!(metrics.calls, 1);
        assert_eq!(metrics.errors, 0);
    }

    #[tokio::test]
    async fn execute_rejects_when_not_active() {
        let module = ping_module();
        let err = module.execute("ping", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            RouteError::ModuleNotActive {
                status: ModuleStatus::Uninitialized,
                ..
            }
        ));
        assert_eq!(module.metrics().calls, 0);
    }

    #[tokio::test]
    async fn execute_rejects_unknown_action_without_metrics() {
        let module = ping_module();
        module.initialize(&[]).await.unwrap();

        let err = module.execute("teleport", json!({})).await.unwrap_err();
        assert!(matches!(err, RouteError::UnsupportedAction { .. }));
        assert_eq!(module.metrics().calls, 0);
    }

    #[tokio::test]
    async fn handler_failure_updates_error_metrics_and_reraises() {
        let module = ping_module();
        module.initialize(&[]).await.unwrap();

        let err = module.execute("fail", json!({})).await.unwrap_err();
        assert!(matches!(err, RouteError::Handler { .. }));
        assert!(err.to_string().contains("handler exploded"));

        let metrics = module.metrics();
        assert_eq!(metrics.calls, 1);
        assert_eq!(metrics.errors, 1);
        assert_eq!(metrics.last_error.as_deref(), Some("handler exploded"));
    }

    #[tokio::test]
    async fn paused_module_rejects_execute_without_call_metric() {
        let module = ping_module();
        module.initialize(&[]).await.unwrap();
        module.pause().unwrap();

        let err = module.execute("ping", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            RouteError::ModuleNotActive {
                status: ModuleStatus::Paused,
                ..
            }
        ));
        assert_eq!(module.metrics().calls, 0);

        module.resume().unwrap();
        module.execute("ping", json!({})).await.unwrap();
        assert_eq!(module.metrics().calls, 1);
    }

    #[tokio::test]
    async fn pause_requires_active() {
        let module = ping_module();
        assert!(matches!(
            module.pause(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn resume_requires_paused() {
        let module = ping_module();
        module.initialize(&[]).await.unwrap();
        assert!(matches!(
            module.resume(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn shutdown_is_terminal_and_idempotent() {
        let module = ping_module();
        module.initialize(&[]).await.unwrap();

        module.shutdown().await.unwrap();
        assert_eq!(module.status(), ModuleStatus::Shutdown);
        assert!(!module.is_healthy());

        // Second shutdown is a no-op.
        module.shutdown().await.unwrap();

        // No transitions out of Shutdown.
        assert!(matches!(
            module.pause(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        let err = module.execute("ping", json!({})).await.unwrap_err();
        assert!(matches!(err, RouteError::ModuleNotActive { .. }));
    }

    struct FailingCleanup;

    impl Behavior for FailingCleanup {
        async fn cleanup(&self) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("flush failed"))
        }
    }

    #[tokio::test]
    async fn cleanup_failure_still_transitions_to_shutdown() {
        let module = Module::builder("cache").behavior(FailingCleanup).build();
        module.initialize(&[]).await.unwrap();

        let err = module.shutdown().await.unwrap_err();
        assert!(err.to_string().contains("flush failed"));
        assert_eq!(module.status(), ModuleStatus::Shutdown);
        assert!(!module.is_healthy());
    }

    struct DeepProbe {
        ok: std::sync::atomic::AtomicBool,
    }

    impl Behavior for DeepProbe {
        async fn health_check(&self) -> bool {
            self.ok.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn health_check_combines_flag_and_probe() {
        let module = Module::builder("probe")
            .behavior(DeepProbe {
                ok: AtomicBool::new(true),
            })
            .build();

        // Not initialized: lifecycle flag wins.
        assert!(!module.health_check().await);

        module.initialize(&[]).await.unwrap();
        assert!(module.health_check().await);
    }

    #[tokio::test]
    async fn send_routes_through_attached_outbound() {
        let module = ping_module();
        module.initialize(&[]).await.unwrap();

        let outbound = Arc::new(FakeOutbound::default());
        module.attach(Arc::clone(&outbound) as Arc<dyn Outbound>);

        let outcome = module.send("storage", "put", json!({"k": "v"})).await.unwrap();
        assert!(matches!(outcome, RouteOutcome::Delivered(_)));

        let sent = outbound.envelopes.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sender, "pinger");
        assert_eq!(sent[0].recipient, "storage");
        assert_eq!(sent[0].action, "put");
    }

    #[tokio::test]
    async fn send_fails_when_detached() {
        let module = ping_module();
        let err = module.send("storage", "put", json!({})).await.unwrap_err();
        assert!(matches!(err, RouteError::NodeUnavailable));
    }

    #[tokio::test]
    async fn events_flow_through_outbound() {
        let module = ping_module();
        let outbound = Arc::new(FakeOutbound::default());
        module.attach(Arc::clone(&outbound) as Arc<dyn Outbound>);

        module.initialize(&[]).await.unwrap();
        module.execute("ping", json!({})).await.unwrap();

        let events = outbound.events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, NodeEvent::ModuleInitialized { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, NodeEvent::ModuleExecuted { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            NodeEvent::StatusChanged {
                status: ModuleStatus::Active,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn summary_reflects_state() {
        let module = ping_module();
        module.initialize(&[]).await.unwrap();
        module.execute("ping", json!({})).await.unwrap();

        let summary = module.summary();
        assert_eq!(summary.name, "pinger");
        assert_eq!(summary.status, ModuleStatus::Active);
        assert!(summary.healthy);
        assert_eq!(summary.metrics.calls, 1);
        assert_eq!(summary.capabilities, vec!["fail".to_string(), "ping".to_string()]);
    }
}
