//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → /metrics on the HTTP transport (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use self::metrics::MetricFactory;
