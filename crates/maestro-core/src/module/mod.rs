//! Module runtime: capabilities, lifecycle, metrics, and the outbound seam.
//!
//! - `capability` -- named-action handler table built at construction
//! - `behavior` -- setup/cleanup/health hooks a module implementation provides
//! - `outbound` -- the narrow sender interface a module uses to reach its node
//! - `runtime` -- the `Module` state machine and `ModuleBuilder`

pub mod behavior;
pub mod capability;
pub mod outbound;
pub mod runtime;

pub use behavior::{Behavior, BoxBehavior, NoopBehavior};
pub use capability::{Capability, CapabilitySet};
pub use outbound::{Outbound, RouteOutcome};
pub use runtime::{Module, ModuleBuilder};
