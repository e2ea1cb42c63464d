//! Message envelope for inter-module routing.
//!
//! An `Envelope` carries one action invocation from a sender module to a
//! recipient module through the node. Envelopes are immutable once sent:
//! every field is populated at construction, so the router never patches a
//! half-filled message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery priority of an envelope.
///
/// Carried for classification and observability. The backlog queue is
/// strictly FIFO; priority does not reorder dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

/// A message routed between modules.
///
/// The `sender` and `recipient` fields are module names (the registry's
/// primary key). The `action` keys into the recipient's capability set, and
/// `payload` is opaque to the router -- only the recipient's handler
/// interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// UUIDv7 message ID, unique per node lifetime.
    pub id: Uuid,
    /// Propagated across a causal chain of related envelopes.
    pub trace_id: Uuid,
    /// Name of the sending module.
    pub sender: String,
    /// Name of the recipient module.
    pub recipient: String,
    /// Action key into the recipient's capability set.
    pub action: String,
    /// Flexible JSON payload, capability-specific.
    pub payload: serde_json::Value,
    /// Delivery priority (informational).
    #[serde(default)]
    pub priority: Priority,
    /// When the envelope was created.
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Build an envelope with a fresh message ID, trace ID, and timestamp.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            trace_id: Uuid::now_v7(),
            sender: sender.into(),
            recipient: recipient.into(),
            action: action.into(),
            payload,
            priority: Priority::Normal,
            timestamp: Utc::now(),
        }
    }

    /// Continue an existing causal chain instead of starting a new one.
    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Override the default `Normal` priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Approximate serialized size in bytes, for the bytes-transferred metric.
    pub fn approx_wire_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_populates_every_field() {
        let env = Envelope::new("scheduler", "storage", "put", json!({"key": "k"}));
        assert_eq!(env.sender, "scheduler");
        assert_eq!(env.recipient, "storage");
        assert_eq!(env.action, "put");
        assert_eq!(env.priority, Priority::Normal);
        assert!(!env.id.is_nil());
        assert!(!env.trace_id.is_nil());
    }

    #[test]
    fn with_trace_id_propagates_chain() {
        let first = Envelope::new("a", "b", "ping", json!({}));
        let second = Envelope::new("b", "c", "ping", json!({})).with_trace_id(first.trace_id);
        assert_eq!(second.trace_id, first.trace_id);
        assert_ne!(second.id, first.id);
    }

    #[test]
    fn with_priority_overrides_default() {
        let env = Envelope::new("a", "b", "alert", json!({})).with_priority(Priority::Critical);
        assert_eq!(env.priority, Priority::Critical);
    }

    #[test]
    fn json_roundtrip() {
        let env = Envelope::new("a", "b", "ping", json!({"n": 1}));
        let json_str = serde_json::to_string(&env).unwrap();
        assert!(json_str.contains("\"priority\":\"normal\""));
        assert!(json_str.contains("\"action\":\"ping\""));

        let parsed: Envelope = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.id, env.id);
        assert_eq!(parsed.trace_id, env.trace_id);
        assert_eq!(parsed.payload["n"], 1);
    }

    #[test]
    fn priority_defaults_when_missing() {
        let env = Envelope::new("a", "b", "ping", json!({}));
        let mut value = serde_json::to_value(&env).unwrap();
        value.as_object_mut().unwrap().remove("priority");
        let parsed: Envelope = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.priority, Priority::Normal);
    }

    #[test]
    fn approx_wire_size_is_nonzero() {
        let env = Envelope::new("a", "b", "ping", json!({"data": "0123456789"}));
        assert!(env.approx_wire_size() > 0);
    }
}
