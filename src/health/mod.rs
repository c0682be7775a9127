//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Startup gate (monitor.rs):
//!     Node → HealthMonitor::check (bounded by deadline)
//!     → probe (storage database reachability)
//!     → publish state.rs snapshot
//!
//! HTTP /healthz:
//!     → HealthMonitor::check (fresh bounded probe)
//! ```
//!
//! # Design Decisions
//! - One failed startup check is fatal; retries belong to the probe
//! - A probe that outlives its deadline is Unhealthy, never a hang

pub mod monitor;
pub mod state;

pub use monitor::{HealthError, HealthMonitor, HealthProbe, ProbeError, StorageProbe};
pub use state::{HealthCell, HealthSnapshot, HealthState};
