//! Collaborators handed to RPC service registration.

use std::sync::Arc;

use crate::keys::KeyProtoFactory;
use crate::observability::MetricFactory;
use crate::quota::QuotaManager;
use crate::storage::{AdminStorage, LogStorage, TreeType};

/// Everything a registered service may depend on.
#[derive(Clone)]
pub struct Registry {
    pub admin_storage: Arc<dyn AdminStorage>,
    pub log_storage: Arc<dyn LogStorage>,
    pub quota_manager: Arc<dyn QuotaManager>,
    pub metric_factory: MetricFactory,
    pub key_factory: Arc<dyn KeyProtoFactory>,
    pub allowed_tree_types: Vec<TreeType>,
    /// Quota failures are logged instead of rejected.
    pub quota_dry_run: bool,
}

impl Registry {
    pub fn allows(&self, tree_type: TreeType) -> bool {
        self.allowed_tree_types.contains(&tree_type)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("log_storage", &self.log_storage.name())
            .field("metric_factory", &self.metric_factory)
            .field("allowed_tree_types", &self.allowed_tree_types)
            .field("quota_dry_run", &self.quota_dry_run)
            .finish_non_exhaustive()
    }
}
