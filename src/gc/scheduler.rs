//! Jittered sweep loop.
//!
//! # States
//! ```text
//! Idle --(random sleep in [min, 2*min))--> Sweeping --> Idle
//!   └──(shutdown during sleep)──> exit
//! Sweeping --(shutdown before the next delete)--> exit
//! ```
//!
//! # Design Decisions
//! - Jitter keeps a fleet of identical nodes from sweeping in lockstep
//! - One sweep at a time per node; shutdown waits for at most one delete
//! - Sweep errors are logged, never fatal to the loop
//! - Enabled with a zero interval refuses to run rather than spin

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::TreeGcConfig;
use crate::gc::sweep::{DeletedTreeGc, SweepResult};
use crate::gc::{GcStatus, SweepReport};
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::observability::MetricFactory;

/// Source of the wait before each sweep.
pub trait IntervalSource: Send {
    fn next_interval(&mut self, min: Duration) -> Duration;
}

/// Draw uniformly from `[min, 2*min)`.
pub fn jittered(min: Duration, rng: &mut impl Rng) -> Duration {
    if min.is_zero() {
        return Duration::ZERO;
    }
    rng.gen_range(min..min.saturating_mul(2))
}

/// Uniform jitter over `[min, 2*min)`.
pub struct JitteredInterval<R = StdRng> {
    rng: R,
}

impl JitteredInterval<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng + Send> IntervalSource for JitteredInterval<R> {
    fn next_interval(&mut self, min: Duration) -> Duration {
        jittered(min, &mut self.rng)
    }
}

/// Always waits exactly `min`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedInterval;

impl IntervalSource for FixedInterval {
    fn next_interval(&mut self, min: Duration) -> Duration {
        min
    }
}

pub struct GcScheduler {
    gc: DeletedTreeGc,
    config: TreeGcConfig,
    intervals: Box<dyn IntervalSource>,
    status: GcStatus,
    metrics: MetricFactory,
}

impl GcScheduler {
    pub fn new(
        gc: DeletedTreeGc,
        config: TreeGcConfig,
        intervals: Box<dyn IntervalSource>,
        status: GcStatus,
        metrics: MetricFactory,
    ) -> Self {
        Self {
            gc,
            config,
            intervals,
            status,
            metrics,
        }
    }

    /// Start the loop on its own task with its own stop signal.
    pub fn spawn(self) -> GcHandle {
        let stop = Shutdown::new();
        let task = tokio::spawn(self.run(stop.subscribe()));
        GcHandle { stop, task }
    }

    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        if !self.config.enabled {
            tracing::info!("Tree GC disabled");
            return;
        }

        let min = self.config.min_run_interval();
        if min.is_zero() {
            tracing::error!("Tree GC enabled with a zero sweep interval, not starting");
            return;
        }
        tracing::info!(
            min_interval = ?min,
            delete_threshold = ?self.config.delete_threshold(),
            "Tree GC starting"
        );

        loop {
            let wait = self.intervals.next_interval(min);
            tokio::select! {
                _ = time::sleep(wait) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Tree GC received shutdown signal, exiting loop");
                    break;
                }
            }

            let result = self.gc.sweep(&shutdown).await;
            self.report(&result);
            if result.interrupted {
                break;
            }
        }
    }

    fn report(&self, result: &SweepResult) {
        self.metrics.record_sweep(result.trees_deleted, result.errors.len());
        self.status.publish(SweepReport {
            finished_at: SystemTime::now(),
            trees_considered: result.trees_considered,
            trees_deleted: result.trees_deleted,
            errors: result.errors.len(),
        });

        if result.errors.is_empty() {
            tracing::info!(
                considered = result.trees_considered,
                deleted = result.trees_deleted,
                "Tree GC sweep complete"
            );
        } else {
            for error in &result.errors {
                tracing::warn!(error = %error, "Tree GC sweep error");
            }
            tracing::warn!(
                considered = result.trees_considered,
                deleted = result.trees_deleted,
                errors = result.errors.len(),
                "Tree GC sweep completed with errors"
            );
        }
    }
}

/// Running scheduler task.
pub struct GcHandle {
    stop: Shutdown,
    task: JoinHandle<()>,
}

impl GcHandle {
    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        self.stop.trigger();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Tree GC task failed");
        }
    }
}
