//! The outbound seam: how a module reaches the rest of the system.
//!
//! Instead of handing each module a back-pointer to the node, registration
//! attaches this narrow interface. A module can route envelopes and publish
//! events through it -- nothing else. Tests swap in a fake implementation.

use futures_util::future::BoxFuture;
use maestro_types::envelope::Envelope;
use maestro_types::error::RouteError;
use maestro_types::event::NodeEvent;

/// What `route()` did with an envelope.
#[derive(Debug)]
pub enum RouteOutcome {
    /// Dispatched immediately; carries the recipient handler's result.
    Delivered(serde_json::Value),
    /// The node was mid-dispatch; the envelope joined the backlog and will
    /// be drained FIFO. No result is observable by the sender.
    Queued,
}

/// Narrow sender interface injected into a module at registration.
pub trait Outbound: Send + Sync {
    /// Route an envelope through the owning node.
    fn deliver(&self, envelope: Envelope) -> BoxFuture<'static, Result<RouteOutcome, RouteError>>;

    /// Publish an event onto the owning node's event bus.
    fn publish(&self, event: NodeEvent);
}
