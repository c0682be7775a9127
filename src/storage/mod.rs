//! Storage collaborator interfaces.
//!
//! # Data Flow
//! ```text
//! StorageProvider
//!     → admin_storage()  (tree metadata, health probe, hard delete)
//!     → log_storage()    (opaque to the node, handed to RPC services)
//!     → close()          (released last during shutdown)
//! ```
//!
//! # Design Decisions
//! - The node never locks around storage; implementations are Send + Sync
//! - Hard delete of a missing tree is a no-op, so sweeps from several nodes
//!   may overlap safely

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

pub use memory::MemoryStorageProvider;

/// Identifier of a tree.
pub type TreeId = i64;

/// Kind of data structure a tree holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreeType {
    Log,
    PreorderedLog,
    Map,
}

impl fmt::Display for TreeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TreeType::Log => "LOG",
            TreeType::PreorderedLog => "PREORDERED_LOG",
            TreeType::Map => "MAP",
        };
        f.write_str(name)
    }
}

/// Tree metadata as kept by admin storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub tree_id: TreeId,
    pub tree_type: TreeType,
    pub display_name: String,
    pub create_time: SystemTime,
    /// Set when the tree is soft-deleted.
    pub delete_time: Option<SystemTime>,
}

impl Tree {
    pub fn is_deleted(&self) -> bool {
        self.delete_time.is_some()
    }
}

/// Errors reported by storage implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("tree {0} not found")]
    NotFound(TreeId),

    #[error("tree {0} is not soft-deleted")]
    NotDeleted(TreeId),

    #[error("tree {0} is already soft-deleted")]
    AlreadyDeleted(TreeId),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage is closed")]
    Closed,
}

/// Tree metadata storage.
#[async_trait]
pub trait AdminStorage: Send + Sync {
    /// Verify the backing database can be reached.
    async fn check_database_accessible(&self) -> Result<(), StorageError>;

    /// List trees, optionally including soft-deleted ones.
    async fn list_trees(&self, include_deleted: bool) -> Result<Vec<Tree>, StorageError>;

    async fn get_tree(&self, tree_id: TreeId) -> Result<Tree, StorageError>;

    async fn create_tree(&self, tree_type: TreeType, display_name: &str) -> Result<Tree, StorageError>;

    /// Mark a tree deleted without removing its data.
    async fn soft_delete_tree(&self, tree_id: TreeId) -> Result<Tree, StorageError>;

    async fn undelete_tree(&self, tree_id: TreeId) -> Result<Tree, StorageError>;

    /// Permanently purge a soft-deleted tree. Purging a tree that no longer
    /// exists succeeds.
    async fn hard_delete_tree(&self, tree_id: TreeId) -> Result<(), StorageError>;
}

/// Log data storage. Opaque to the node; passed through to RPC services.
pub trait LogStorage: Send + Sync {
    fn name(&self) -> &str;
}

/// Source of storage handles and owner of their underlying resources.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn admin_storage(&self) -> Arc<dyn AdminStorage>;

    fn log_storage(&self) -> Arc<dyn LogStorage>;

    /// Release underlying resources.
    async fn close(&self) -> Result<(), StorageError>;
}

/// Open the provider named in configuration.
pub fn open_provider(name: &str) -> Result<Arc<dyn StorageProvider>, StorageError> {
    match name {
        "memory" => Ok(Arc::new(MemoryStorageProvider::new())),
        other => Err(StorageError::Unavailable(format!("unknown storage provider {other:?}"))),
    }
}
