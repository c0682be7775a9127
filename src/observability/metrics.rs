//! Metrics collection and exposition.
//!
//! # Metrics
//! - `<prefix>_node_health` (gauge): 1=healthy, 0=unhealthy
//! - `<prefix>_tree_gc_sweeps_total` (counter)
//! - `<prefix>_tree_gc_trees_deleted_total` (counter)
//! - `<prefix>_tree_gc_errors_total` (counter)
//! - `<prefix>_quota_dry_run_denials_total` (counter)
//! - `<prefix>_quota_denials_total` (counter)
//!
//! # Design Decisions
//! - One global Prometheus recorder, installed by the binary
//! - Subsystems obtain handles through a prefixed [`MetricFactory`]

use metrics::{Counter, Gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder as the global metrics sink.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Creates prefixed metric handles and renders the exposition text.
#[derive(Clone)]
pub struct MetricFactory {
    prefix: String,
    handle: Option<PrometheusHandle>,
}

impl MetricFactory {
    pub fn new(prefix: impl Into<String>, handle: PrometheusHandle) -> Self {
        Self {
            prefix: prefix.into(),
            handle: Some(handle),
        }
    }

    /// A factory with no exporter attached; `/metrics` renders nothing.
    pub fn detached(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            handle: None,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn name(&self, metric: &str) -> String {
        if self.prefix.is_empty() {
            metric.to_string()
        } else {
            format!("{}_{}", self.prefix, metric)
        }
    }

    pub fn counter(&self, metric: &str) -> Counter {
        metrics::counter!(self.name(metric))
    }

    pub fn gauge(&self, metric: &str) -> Gauge {
        metrics::gauge!(self.name(metric))
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.as_ref().map(PrometheusHandle::render).unwrap_or_default()
    }

    pub fn record_health(&self, healthy: bool) {
        self.gauge("node_health").set(if healthy { 1.0 } else { 0.0 });
    }

    pub fn record_sweep(&self, deleted: usize, errors: usize) {
        self.counter("tree_gc_sweeps_total").increment(1);
        self.counter("tree_gc_trees_deleted_total").increment(deleted as u64);
        self.counter("tree_gc_errors_total").increment(errors as u64);
    }

    pub fn record_quota_denial(&self, dry_run: bool) {
        if dry_run {
            self.counter("quota_dry_run_denials_total").increment(1);
        } else {
            self.counter("quota_denials_total").increment(1);
        }
    }
}

impl std::fmt::Debug for MetricFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricFactory")
            .field("prefix", &self.prefix)
            .field("exporter", &self.handle.is_some())
            .finish()
    }
}
