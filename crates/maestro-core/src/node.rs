//! The router node: module registry, dispatch, backlog, events, lifecycle.
//!
//! All cross-module traffic flows through one `Node`. A tokio mutex
//! serializes dispatch (at most one envelope in flight per node); envelopes
//! arriving mid-dispatch join a bounded FIFO backlog that is drained once the
//! in-flight dispatch completes. The backlog's overflow policy is
//! drop-oldest, and drops are never silent: each one logs a warning and
//! emits a `QueueOverflow` event.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use maestro_types::config::NodeConfig;
use maestro_types::envelope::{Envelope, Priority};
use maestro_types::error::{NodeError, RegistryError, RouteError};
use maestro_types::event::NodeEvent;
use maestro_types::node::{HealthReport, NodeStatus, QueueStatus, SystemStatus};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::NodeMetrics;
use crate::module::outbound::{Outbound, RouteOutcome};
use crate::module::Module;
use crate::resolver::resolve_init_order;

/// Side-channel observer invoked after each successful dispatch matching its
/// `module:action` key.
pub type ObserverFn = Arc<dyn Fn(&Envelope) + Send + Sync>;

struct NodeInner {
    config: NodeConfig,
    modules: DashMap<String, Arc<Module>>,
    /// Registry names in registration order; shutdown walks it in reverse.
    registration_order: Mutex<Vec<String>>,
    backlog: Mutex<VecDeque<Envelope>>,
    /// The single-dispatch guarantee. Holding this mutex IS being the one
    /// dispatch in flight; `status` merely mirrors it for introspection.
    dispatch_lock: tokio::sync::Mutex<()>,
    status: RwLock<NodeStatus>,
    events: broadcast::Sender<NodeEvent>,
    observers: DashMap<String, ObserverFn>,
    metrics: NodeMetrics,
}

/// Central registry and dispatcher for a set of modules.
///
/// Cloning is cheap (shared inner state); all clones address the same
/// registry, backlog, and event bus.
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(NodeInner {
                config,
                modules: DashMap::new(),
                registration_order: Mutex::new(Vec::new()),
                backlog: Mutex::new(VecDeque::new()),
                dispatch_lock: tokio::sync::Mutex::new(()),
                status: RwLock::new(NodeStatus::Initializing),
                events,
                observers: DashMap::new(),
                metrics: NodeMetrics::new(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a module under its name and attach the outbound seam.
    ///
    /// Duplicate names fail fast; the existing registration is untouched.
    pub fn register(&self, module: Arc<Module>) -> Result<(), RegistryError> {
        let name = module.name().to_string();
        match self.inner.modules.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RegistryError::DuplicateName(name))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                module.attach(Arc::new(NodeOutbound {
                    inner: Arc::downgrade(&self.inner),
                }));
                self.inner.registration_order.lock().unwrap().push(name.clone());
                slot.insert(module);
                debug!(module = %name, "module registered");
                Ok(())
            }
        }
    }

    /// Remove a module from the registry and detach its outbound seam.
    ///
    /// Does NOT shut the module down -- that stays the caller's call.
    /// Returns the module if it was registered.
    pub fn deregister(&self, name: &str) -> Option<Arc<Module>> {
        let (_, module) = self.inner.modules.remove(name)?;
        module.detach();
        self.inner
            .registration_order
            .lock()
            .unwrap()
            .retain(|n| n != name);
        debug!(module = %name, "module deregistered");
        Some(module)
    }

    pub fn get_module(&self, name: &str) -> Option<Arc<Module>> {
        self.inner.modules.get(name).map(|m| Arc::clone(&m))
    }

    pub fn module_count(&self) -> usize {
        self.inner.modules.len()
    }

    /// Registered modules in registration order.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        let order = self.inner.registration_order.lock().unwrap().clone();
        order.iter().filter_map(|n| self.get_module(n)).collect()
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    /// Route an envelope to its recipient.
    ///
    /// If no dispatch is in flight the envelope is dispatched immediately and
    /// the recipient handler's result (or failure) is returned. Otherwise the
    /// envelope joins the backlog -- dropping the oldest entry with a warning
    /// when full -- and `Queued` is returned; it will be drained FIFO after
    /// the in-flight dispatch completes.
    pub async fn route(&self, envelope: Envelope) -> Result<RouteOutcome, RouteError> {
        let guard = match self.inner.dispatch_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.enqueue(envelope);
                self.spawn_drain();
                return Ok(RouteOutcome::Queued);
            }
        };

        let result = self.dispatch(&envelope).await;
        drop(guard);
        self.spawn_drain();
        result.map(RouteOutcome::Delivered)
    }

    /// Dispatch one envelope with the lock held: validate, execute, record.
    async fn dispatch(&self, envelope: &Envelope) -> Result<serde_json::Value, RouteError> {
        let started = Instant::now();
        let result = self.try_dispatch(envelope).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                self.inner
                    .metrics
                    .record_route(latency_ms, envelope.approx_wire_size());
                self.publish(NodeEvent::MessageRouted {
                    id: envelope.id,
                    trace_id: envelope.trace_id,
                    sender: envelope.sender.clone(),
                    recipient: envelope.recipient.clone(),
                    action: envelope.action.clone(),
                    latency_ms,
                });
                self.notify_observers(envelope);
                Ok(value)
            }
            Err(err) => {
                self.publish(NodeEvent::RoutingError {
                    id: envelope.id,
                    sender: envelope.sender.clone(),
                    recipient: envelope.recipient.clone(),
                    action: envelope.action.clone(),
                    error: err.to_string(),
                });
                warn!(
                    sender = %envelope.sender,
                    recipient = %envelope.recipient,
                    action = %envelope.action,
                    error = %err,
                    "routing failed"
                );
                Err(err)
            }
        }
    }

    async fn try_dispatch(&self, envelope: &Envelope) -> Result<serde_json::Value, RouteError> {
        let module = self
            .get_module(&envelope.recipient)
            .ok_or_else(|| RouteError::ModuleNotFound(envelope.recipient.clone()))?;

        if !module.capabilities().contains(&envelope.action) {
            return Err(RouteError::UnsupportedAction {
                module: envelope.recipient.clone(),
                action: envelope.action.clone(),
            });
        }

        self.set_status(NodeStatus::Processing);
        let result = match self.inner.config.route_timeout() {
            Some(limit) => {
                match tokio::time::timeout(
                    limit,
                    module.execute(&envelope.action, envelope.payload.clone()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(RouteError::Timeout {
                        module: envelope.recipient.clone(),
                        action: envelope.action.clone(),
                        elapsed_ms: limit.as_millis() as u64,
                    }),
                }
            }
            None => module.execute(&envelope.action, envelope.payload.clone()).await,
        };
        self.set_status(NodeStatus::Ready);
        result
    }

    fn enqueue(&self, envelope: Envelope) {
        let capacity = self.inner.config.max_queue_size;
        let mut backlog = self.inner.backlog.lock().unwrap();
        if backlog.len() >= capacity {
            if let Some(dropped) = backlog.pop_front() {
                warn!(
                    dropped_id = %dropped.id,
                    capacity,
                    "backlog full, dropping oldest envelope"
                );
                self.publish(NodeEvent::QueueOverflow {
                    dropped_id: dropped.id,
                    queue_capacity: capacity,
                });
            }
        }
        backlog.push_back(envelope);
    }

    /// Drain the backlog once the dispatch lock frees up. Queued envelopes
    /// have no awaiting caller, so their failures are logged and emitted as
    /// `RoutingError` instead of propagating.
    fn spawn_drain(&self) {
        if self.inner.backlog.lock().unwrap().is_empty() {
            return;
        }
        let node = self.clone();
        tokio::spawn(async move {
            loop {
                let guard = node.inner.dispatch_lock.lock().await;
                let Some(envelope) = node.inner.backlog.lock().unwrap().pop_front() else {
                    break;
                };
                if let Err(err) = node.dispatch(&envelope).await {
                    debug!(
                        recipient = %envelope.recipient,
                        action = %envelope.action,
                        error = %err,
                        "queued envelope failed to dispatch"
                    );
                }
                drop(guard);
            }
        });
    }

    /// Route `action` to every registered module except `sender` that exposes
    /// it, at high priority. One recipient's failure never aborts delivery to
    /// the others. Returns the number of accepted deliveries.
    pub async fn broadcast(
        &self,
        action: &str,
        payload: serde_json::Value,
        sender: &str,
    ) -> usize {
        debug!(action, sender, "broadcasting");
        let names = self.inner.registration_order.lock().unwrap().clone();
        let mut delivered = 0;
        for name in names {
            if name == sender {
                continue;
            }
            let Some(module) = self.get_module(&name) else {
                continue;
            };
            if !module.capabilities().contains(action) {
                continue;
            }
            let envelope = Envelope::new(sender, name.clone(), action, payload.clone())
                .with_priority(Priority::High);
            match self.route(envelope).await {
                Ok(_) => delivered += 1,
                Err(err) => {
                    warn!(recipient = %name, action, error = %err, "broadcast delivery failed");
                }
            }
        }
        delivered
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Subscribe an observer for successful dispatches of `module:action`.
    ///
    /// Re-subscribing the same key replaces the prior observer. The returned
    /// guard removes the observer on `unsubscribe()`.
    pub fn subscribe(
        &self,
        module: &str,
        action: &str,
        observer: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> ObserverGuard {
        let key = format!("{module}:{action}");
        self.inner.observers.insert(key.clone(), Arc::new(observer));
        ObserverGuard {
            key,
            node: Arc::downgrade(&self.inner),
        }
    }

    fn notify_observers(&self, envelope: &Envelope) {
        let key = format!("{}:{}", envelope.recipient, envelope.action);
        let observer = self
            .inner
            .observers
            .get(&key)
            .map(|entry| Arc::clone(entry.value()));
        if let Some(observer) = observer {
            observer(envelope);
        }
    }

    /// A receiver for the node's event bus. Events published with no
    /// subscribers are dropped silently.
    pub fn events(&self) -> broadcast::Receiver<NodeEvent> {
        self.inner.events.subscribe()
    }

    fn publish(&self, event: NodeEvent) {
        let _ = self.inner.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Initialize every registered module in dependency order.
    ///
    /// Fail-fast: resolution errors (cycles, unknown dependencies) and the
    /// first module failure abort the whole sequence and propagate.
    pub async fn initialize(&self) -> Result<(), NodeError> {
        self.set_status(NodeStatus::Initializing);
        info!(modules = self.module_count(), "node initializing");

        let modules = self.modules();
        let order = resolve_init_order(&modules)?;

        for name in &order {
            let Some(module) = self.get_module(name) else {
                continue;
            };
            let deps: Vec<Arc<Module>> = module
                .dependencies()
                .iter()
                .filter_map(|dep| self.get_module(dep))
                .collect();
            if let Err(err) = module.initialize(&deps).await {
                error!(module = %name, error = %err, "module failed to initialize");
                return Err(err.into());
            }
        }

        self.set_status(NodeStatus::Ready);
        info!("node ready");
        Ok(())
    }

    /// Shut every module down in reverse registration order.
    ///
    /// Best-effort: individual failures are logged and shutdown continues
    /// for the remaining modules.
    pub async fn shutdown(&self) {
        self.set_status(NodeStatus::ShuttingDown);
        info!("node shutting down");

        let names: Vec<String> = {
            let order = self.inner.registration_order.lock().unwrap();
            order.iter().rev().cloned().collect()
        };
        for name in names {
            if let Some(module) = self.get_module(&name) {
                if let Err(err) = module.shutdown().await {
                    warn!(module = %name, error = %err, "module shutdown failed");
                }
            }
        }

        self.set_status(NodeStatus::Shutdown);
        info!("node shut down");
    }

    /// Each module's health verdict, in registration order.
    pub async fn health_check(&self) -> Vec<HealthReport> {
        let mut checks = Vec::new();
        for module in self.modules() {
            checks.push(HealthReport {
                module: module.name().to_string(),
                healthy: module.health_check().await,
            });
        }
        checks
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn status(&self) -> NodeStatus {
        *self.inner.status.read().unwrap()
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.inner.metrics
    }

    /// Full snapshot: node status, module summaries, aggregate metrics, and
    /// the current backlog depth.
    pub fn system_status(&self) -> SystemStatus {
        let modules: Vec<_> = self.modules().iter().map(|m| m.summary()).collect();
        SystemStatus {
            node_status: self.status(),
            total_modules: modules.len(),
            modules,
            metrics: self.inner.metrics.snapshot(),
            queue_depth: self.inner.backlog.lock().unwrap().len(),
        }
    }

    /// Backlog snapshot with up to the first ten queued envelopes.
    pub fn queue_status(&self) -> QueueStatus {
        let backlog = self.inner.backlog.lock().unwrap();
        let capacity = self.inner.config.max_queue_size;
        QueueStatus {
            depth: backlog.len(),
            capacity,
            percent_full: if capacity > 0 {
                backlog.len() as f64 / capacity as f64 * 100.0
            } else {
                0.0
            },
            head: backlog.iter().take(10).cloned().collect(),
        }
    }

    fn set_status(&self, status: NodeStatus) {
        *self.inner.status.write().unwrap() = status;
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(NodeConfig::default())
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("status", &self.status())
            .field("modules", &self.inner.modules.len())
            .field("queue_depth", &self.inner.backlog.lock().unwrap().len())
            .finish()
    }
}

/// The node's side of the outbound seam handed to modules at registration.
///
/// Holds a weak reference so a registered module can never keep a dropped
/// node alive; delivery after the node is gone fails with `NodeUnavailable`.
struct NodeOutbound {
    inner: Weak<NodeInner>,
}

impl Outbound for NodeOutbound {
    fn deliver(&self, envelope: Envelope) -> BoxFuture<'static, Result<RouteOutcome, RouteError>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let inner = inner.upgrade().ok_or(RouteError::NodeUnavailable)?;
            Node { inner }.route(envelope).await
        })
    }

    fn publish(&self, event: NodeEvent) {
        if let Some(inner) = self.inner.upgrade() {
            if let NodeEvent::ModuleError { module, error, .. } = &event {
                warn!(module = %module, error = %error, "module reported error");
            }
            let _ = inner.events.send(event);
        }
    }
}

/// Handle for removing a keyed observer installed via [`Node::subscribe`].
pub struct ObserverGuard {
    key: String,
    node: Weak<NodeInner>,
}

impl ObserverGuard {
    /// Remove the observer. A no-op if the node is already gone.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.node.upgrade() {
            inner.observers.remove(&self.key);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
