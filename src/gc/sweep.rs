//! Hard deletion of trees that stayed soft-deleted past the threshold.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::lifecycle::shutdown::ShutdownSignal;
use crate::storage::{AdminStorage, StorageError, TreeId};

/// A problem hit during one sweep. The sweep carries on past it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepError {
    #[error("listing trees failed: {0}")]
    List(#[source] StorageError),

    #[error("hard delete of tree {tree_id} failed: {source}")]
    HardDelete {
        tree_id: TreeId,
        #[source]
        source: StorageError,
    },
}

/// Outcome of a single sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Soft-deleted trees older than the threshold.
    pub trees_considered: usize,
    pub trees_deleted: usize,
    /// In the order encountered.
    pub errors: Vec<SweepError>,
    /// Stopped early because shutdown was requested.
    pub interrupted: bool,
}

/// Finds and purges expired soft-deleted trees.
#[derive(Clone)]
pub struct DeletedTreeGc {
    admin: Arc<dyn AdminStorage>,
    delete_threshold: Duration,
}

impl DeletedTreeGc {
    pub fn new(admin: Arc<dyn AdminStorage>, delete_threshold: Duration) -> Self {
        Self {
            admin,
            delete_threshold,
        }
    }

    pub async fn sweep(&self, stop: &ShutdownSignal) -> SweepResult {
        self.sweep_at(SystemTime::now(), stop).await
    }

    /// Sweep as if the current time were `now`.
    ///
    /// `stop` is checked before each hard delete; a delete already issued
    /// runs to completion and the partial result is returned.
    pub async fn sweep_at(&self, now: SystemTime, stop: &ShutdownSignal) -> SweepResult {
        let mut result = SweepResult::default();
        let cutoff = now.checked_sub(self.delete_threshold).unwrap_or(UNIX_EPOCH);

        let trees = match self.admin.list_trees(true).await {
            Ok(trees) => trees,
            Err(e) => {
                result.errors.push(SweepError::List(e));
                return result;
            }
        };

        for tree in trees {
            let Some(deleted_at) = tree.delete_time else {
                continue;
            };
            if deleted_at >= cutoff {
                continue;
            }
            if stop.is_triggered() {
                tracing::info!(
                    deleted = result.trees_deleted,
                    "Tree GC sweep interrupted by shutdown"
                );
                result.interrupted = true;
                break;
            }
            result.trees_considered += 1;

            match self.admin.hard_delete_tree(tree.tree_id).await {
                Ok(()) => {
                    tracing::info!(tree_id = tree.tree_id, "Hard-deleted tree");
                    result.trees_deleted += 1;
                }
                // Another node got there first.
                Err(StorageError::NotFound(_)) => {}
                Err(source) => {
                    tracing::warn!(tree_id = tree.tree_id, error = %source, "Hard delete failed");
                    result.errors.push(SweepError::HardDelete {
                        tree_id: tree.tree_id,
                        source,
                    });
                }
            }
        }

        result
    }
}
