//! Aggregate routing metrics for a node.
//!
//! Counters are atomic; latency samples live behind a short-held mutex.
//! `snapshot()` produces the read-only record exposed by status queries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use maestro_types::node::MetricsSnapshot;

/// Routed-message counters and latency samples.
pub struct NodeMetrics {
    messages_routed: AtomicU64,
    bytes_transferred: AtomicU64,
    latency_samples: Mutex<Vec<u64>>,
    started_at: Instant,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self {
            messages_routed: AtomicU64::new(0),
            bytes_transferred: AtomicU64::new(0),
            latency_samples: Mutex::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    /// Record one successful dispatch: exactly one count, one latency sample,
    /// and the envelope's approximate wire size.
    pub fn record_route(&self, latency_ms: u64, bytes: usize) {
        self.messages_routed.fetch_add(1, Ordering::Relaxed);
        self.bytes_transferred
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.latency_samples.lock().unwrap().push(latency_ms);
    }

    pub fn messages_routed(&self) -> u64 {
        self.messages_routed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.latency_samples.lock().unwrap();
        let avg_latency_ms = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<u64>() as f64 / samples.len() as f64
        };
        MetricsSnapshot {
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
            avg_latency_ms,
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NodeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeMetrics")
            .field("messages_routed", &self.messages_routed())
            .field(
                "bytes_transferred",
                &self.bytes_transferred.load(Ordering::Relaxed),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let metrics = NodeMetrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.messages_routed, 0);
        assert_eq!(snap.bytes_transferred, 0);
        assert_eq!(snap.avg_latency_ms, 0.0);
    }

    #[test]
    fn record_route_adds_exactly_one_sample() {
        let metrics = NodeMetrics::new();
        metrics.record_route(10, 128);
        metrics.record_route(30, 256);

        let snap = metrics.snapshot();
        assert_eq!(snap.messages_routed, 2);
        assert_eq!(snap.bytes_transferred, 384);
        assert_eq!(snap.avg_latency_ms, 20.0);
    }
}
