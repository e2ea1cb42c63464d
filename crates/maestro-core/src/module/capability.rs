//! Capability table: named actions a module exposes to the node.
//!
//! Handlers are boxed async closures so the table stays object-safe and a
//! module can hold arbitrarily many of them behind one type. The table is
//! built once at module construction; dispatch is a plain map lookup.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

/// Boxed async handler: payload in, result (or failure) out.
pub type CapabilityHandler =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, anyhow::Result<serde_json::Value>> + Send + Sync>;

/// One named action a module can perform.
pub struct Capability {
    description: String,
    handler: CapabilityHandler,
}

impl Capability {
    /// Wrap an async closure as a capability.
    pub fn new<F, Fut>(description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        let handler: CapabilityHandler = Arc::new(move |payload| Box::pin(handler(payload)));
        Self {
            description: description.into(),
            handler,
        }
    }

    /// Human-readable description of what this action does.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Invoke the handler with the given payload.
    pub fn invoke(&self, payload: serde_json::Value) -> BoxFuture<'static, anyhow::Result<serde_json::Value>> {
        (self.handler)(payload)
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("description", &self.description)
            .finish()
    }
}

/// Action-name -> capability lookup table.
///
/// Inserting under an existing name replaces the prior entry; the set is
/// frozen once the module is built.
#[derive(Debug, Default)]
pub struct CapabilitySet {
    inner: HashMap<String, Capability>,
}

impl CapabilitySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Register a capability under the given action name.
    pub fn insert(&mut self, action: impl Into<String>, capability: Capability) {
        self.inner.insert(action.into(), capability);
    }

    /// Look up a capability by action name.
    pub fn get(&self, action: &str) -> Option<&Capability> {
        self.inner.get(action)
    }

    /// Whether the set contains the given action.
    pub fn contains(&self, action: &str) -> bool {
        self.inner.contains_key(action)
    }

    /// All action names, sorted for stable display.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn invoke_runs_handler() {
        let cap = Capability::new("echo the payload back", |payload| async move {
            Ok(json!({ "echo": payload }))
        });
        let result = cap.invoke(json!({"n": 1})).await.unwrap();
        assert_eq!(result["echo"]["n"], 1);
    }

    #[tokio::test]
    async fn invoke_propagates_handler_failure() {
        let cap = Capability::new("always fails", |_| async move {
            Err(anyhow::anyhow!("nope"))
        });
        let err = cap.invoke(json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn set_lookup_and_names() {
        let mut set = CapabilitySet::new();
        set.insert("put", Capability::new("store a value", |_| async { Ok(json!({})) }));
        set.insert("get", Capability::new("fetch a value", |_| async { Ok(json!({})) }));

        assert!(set.contains("put"));
        assert!(!set.contains("delete"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["get".to_string(), "put".to_string()]);
        assert_eq!(set.get("put").unwrap().description(), "store a value");
    }

    #[test]
    fn insert_replaces_existing_action() {
        let mut set = CapabilitySet::new();
        set.insert("ping", Capability::new("first", |_| async { Ok(json!({})) }));
        set.insert("ping", Capability::new("second", |_| async { Ok(json!({})) }));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("ping").unwrap().description(), "second");
    }
}
