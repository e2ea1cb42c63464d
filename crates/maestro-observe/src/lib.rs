//! Observability setup for maestro.
//!
//! One-call tracing subscriber initialization; see [`tracing_setup`].

pub mod tracing_setup;
