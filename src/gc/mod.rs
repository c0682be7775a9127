//! Deleted tree garbage collection.
//!
//! # Data Flow
//! ```text
//! scheduler.rs (jittered sleep, cancellable)
//!     → sweep.rs (list deleted trees → hard delete expired ones)
//!     → SweepResult → logs, metrics, GcStatus (read by /debug/vars)
//! ```

pub mod scheduler;
pub mod sweep;

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::time::SystemTime;

pub use scheduler::{FixedInterval, GcHandle, GcScheduler, IntervalSource, JitteredInterval};
pub use sweep::{DeletedTreeGc, SweepError, SweepResult};

/// Summary of the most recent sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub finished_at: SystemTime,
    pub trees_considered: usize,
    pub trees_deleted: usize,
    pub errors: usize,
}

/// Shared slot holding the last [`SweepReport`].
#[derive(Debug, Clone, Default)]
pub struct GcStatus {
    last: Arc<ArcSwapOption<SweepReport>>,
}

impl GcStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Arc<SweepReport>> {
        self.last.load_full()
    }

    pub(crate) fn publish(&self, report: SweepReport) {
        self.last.store(Some(Arc::new(report)));
    }
}
