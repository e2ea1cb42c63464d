//! Behavior trait: module-specific setup, cleanup, and health hooks.
//!
//! Uses native async fn in traits (RPITIT) with default no-op bodies, plus an
//! object-safe `BehaviorDyn` bridge so `Module` can hold any behavior behind
//! dynamic dispatch:
//! 1. Define `Behavior` with RPITIT methods and defaults
//! 2. Blanket-impl the boxed-future `BehaviorDyn` for all `T: Behavior`
//! 3. `BoxBehavior` wraps `Box<dyn BehaviorDyn>` and delegates

use std::future::Future;

use futures_util::future::BoxFuture;

/// Hooks a module implementation provides to the runtime.
///
/// All methods have defaults: a module with no external resources needs no
/// behavior of its own (see [`NoopBehavior`]).
pub trait Behavior: Send + Sync {
    /// Module-specific initialization, run during `initialize()` after the
    /// dependency-health gate. A failure puts the module in `Error`.
    fn setup(&self) -> impl Future<Output = anyhow::Result<()>> + Send {
        async { Ok(()) }
    }

    /// Module-specific teardown, run during `shutdown()`. A failure is
    /// reported to the caller but does not block the `Shutdown` transition.
    fn cleanup(&self) -> impl Future<Output = anyhow::Result<()>> + Send {
        async { Ok(()) }
    }

    /// Deeper health probe (e.g. an external resource being reachable).
    /// The runtime combines this with its own lifecycle-derived health flag.
    fn health_check(&self) -> impl Future<Output = bool> + Send {
        async { true }
    }
}

/// Object-safe version of [`Behavior`] with boxed futures.
pub trait BehaviorDyn: Send + Sync {
    fn setup_boxed(&self) -> BoxFuture<'_, anyhow::Result<()>>;
    fn cleanup_boxed(&self) -> BoxFuture<'_, anyhow::Result<()>>;
    fn health_check_boxed(&self) -> BoxFuture<'_, bool>;
}

/// Blanket implementation: any `Behavior` automatically implements `BehaviorDyn`.
impl<T: Behavior> BehaviorDyn for T {
    fn setup_boxed(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(Behavior::setup(self))
    }

    fn cleanup_boxed(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(Behavior::cleanup(self))
    }

    fn health_check_boxed(&self) -> BoxFuture<'_, bool> {
        Box::pin(Behavior::health_check(self))
    }
}

/// Type-erased behavior held by the module runtime.
pub struct BoxBehavior {
    inner: Box<dyn BehaviorDyn>,
}

impl BoxBehavior {
    /// Wrap a concrete `Behavior` in a type-erased box.
    pub fn new<T: Behavior + 'static>(behavior: T) -> Self {
        Self {
            inner: Box::new(behavior),
        }
    }

    pub async fn setup(&self) -> anyhow::Result<()> {
        self.inner.setup_boxed().await
    }

    pub async fn cleanup(&self) -> anyhow::Result<()> {
        self.inner.cleanup_boxed().await
    }

    pub async fn health_check(&self) -> bool {
        self.inner.health_check_boxed().await
    }
}

impl std::fmt::Debug for BoxBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BoxBehavior")
    }
}

/// Default behavior: no setup, no cleanup, always healthy.
pub struct NoopBehavior;

impl Behavior for NoopBehavior {}
