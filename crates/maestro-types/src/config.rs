//! Node configuration types.
//!
//! `NodeConfig` represents the `maestro.toml` section that controls the
//! routing backlog and dispatch timeout. All fields have sensible defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a router node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Maximum number of envelopes held in the backlog queue.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Per-dispatch timeout in milliseconds. `0` disables enforcement.
    #[serde(default = "default_route_timeout_ms")]
    pub route_timeout_ms: u64,

    /// Capacity of the node event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_queue_size() -> usize {
    10_000
}

fn default_route_timeout_ms() -> u64 {
    30_000
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            route_timeout_ms: default_route_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl NodeConfig {
    /// The dispatch timeout as a `Duration`, or `None` when disabled.
    pub fn route_timeout(&self) -> Option<Duration> {
        (self.route_timeout_ms > 0).then(|| Duration::from_millis(self.route_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = NodeConfig::default();
        assert_eq!(config.max_queue_size, 10_000);
        assert_eq!(config.route_timeout_ms, 30_000);
        assert_eq!(config.event_capacity, 1024);
        assert_eq!(config.route_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let config: NodeConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_queue_size, 10_000);
        assert_eq!(config.route_timeout_ms, 30_000);
    }

    #[test]
    fn deserialize_with_values() {
        let config: NodeConfig = toml::from_str(
            r#"
max_queue_size = 64
route_timeout_ms = 500
event_capacity = 16
"#,
        )
        .unwrap();
        assert_eq!(config.max_queue_size, 64);
        assert_eq!(config.route_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.event_capacity, 16);
    }

    #[test]
    fn zero_timeout_disables_enforcement() {
        let config: NodeConfig = toml::from_str("route_timeout_ms = 0").unwrap();
        assert_eq!(config.route_timeout(), None);
    }

    #[test]
    fn serde_roundtrip() {
        let config = NodeConfig {
            max_queue_size: 5,
            route_timeout_ms: 100,
            event_capacity: 8,
        };
        let text = toml::to_string(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.max_queue_size, 5);
        assert_eq!(parsed.route_timeout_ms, 100);
    }
}
