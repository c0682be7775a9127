//! Secondary HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! bound HTTP socket (net::ListenerSet)
//!     → server.rs router
//!         /healthz    → HealthMonitor::check (fresh probe)
//!         /metrics    → MetricFactory::render
//!         /debug/vars → HealthCell + GcStatus snapshots
//! ```
//!
//! Optional: an empty endpoint disables it, and a bind failure only
//! degrades the node.

pub mod server;

pub use server::{build_router, AppState};
