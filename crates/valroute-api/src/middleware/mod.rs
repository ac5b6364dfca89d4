//! # Middleware Stack
//!
//! Tower middleware for the API layer:
//! - [`tracing_layer`]: request/response tracing with `TraceLayer`.
//! - [`metrics`]: request, error and per-stage rejection counters.

pub mod metrics;
pub mod tracing_layer;
