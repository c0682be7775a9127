//! In-memory storage provider.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use super::{AdminStorage, LogStorage, StorageError, StorageProvider, Tree, TreeId, TreeType};

/// Admin storage backed by a concurrent map.
#[derive(Debug)]
pub struct MemoryAdminStorage {
    trees: DashMap<TreeId, Tree>,
    next_id: AtomicI64,
    closed: AtomicBool,
}

impl MemoryAdminStorage {
    pub fn new() -> Self {
        Self {
            trees: DashMap::new(),
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Insert a tree as-is, keeping its timestamps.
    pub fn insert_tree(&self, tree: Tree) {
        self.next_id.fetch_max(tree.tree_id + 1, Ordering::SeqCst);
        self.trees.insert(tree.tree_id, tree);
    }

    /// Number of trees held, deleted or not.
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryAdminStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdminStorage for MemoryAdminStorage {
    async fn check_database_accessible(&self) -> Result<(), StorageError> {
        self.ensure_open()
    }

    async fn list_trees(&self, include_deleted: bool) -> Result<Vec<Tree>, StorageError> {
        self.ensure_open()?;
        let mut trees: Vec<Tree> = self
            .trees
            .iter()
            .filter(|entry| include_deleted || !entry.is_deleted())
            .map(|entry| entry.value().clone())
            .collect();
        trees.sort_by_key(|t| t.tree_id);
        Ok(trees)
    }

    async fn get_tree(&self, tree_id: TreeId) -> Result<Tree, StorageError> {
        self.ensure_open()?;
        self.trees
            .get(&tree_id)
            .map(|t| t.clone())
            .ok_or(StorageError::NotFound(tree_id))
    }

    async fn create_tree(&self, tree_type: TreeType, display_name: &str) -> Result<Tree, StorageError> {
        self.ensure_open()?;
        let tree = Tree {
            tree_id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tree_type,
            display_name: display_name.to_string(),
            create_time: SystemTime::now(),
            delete_time: None,
        };
        self.trees.insert(tree.tree_id, tree.clone());
        Ok(tree)
    }

    async fn soft_delete_tree(&self, tree_id: TreeId) -> Result<Tree, StorageError> {
        self.ensure_open()?;
        let mut tree = self.trees.get_mut(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        if tree.is_deleted() {
            return Err(StorageError::AlreadyDeleted(tree_id));
        }
        tree.delete_time = Some(SystemTime::now());
        Ok(tree.clone())
    }

    async fn undelete_tree(&self, tree_id: TreeId) -> Result<Tree, StorageError> {
        self.ensure_open()?;
        let mut tree = self.trees.get_mut(&tree_id).ok_or(StorageError::NotFound(tree_id))?;
        if !tree.is_deleted() {
            return Err(StorageError::NotDeleted(tree_id));
        }
        tree.delete_time = None;
        Ok(tree.clone())
    }

    async fn hard_delete_tree(&self, tree_id: TreeId) -> Result<(), StorageError> {
        self.ensure_open()?;
        // Check and removal happen under one shard lock so a concurrent
        // undelete cannot slip in between.
        if self.trees.remove_if(&tree_id, |_, tree| tree.is_deleted()).is_some() {
            return Ok(());
        }
        if self.trees.contains_key(&tree_id) {
            return Err(StorageError::NotDeleted(tree_id));
        }
        Ok(())
    }
}

/// Log storage placeholder for the in-memory provider.
#[derive(Debug, Default)]
pub struct MemoryLogStorage;

impl LogStorage for MemoryLogStorage {
    fn name(&self) -> &str {
        "memory"
    }
}

/// Storage provider holding everything in process memory.
#[derive(Debug, Clone)]
pub struct MemoryStorageProvider {
    admin: Arc<MemoryAdminStorage>,
    log: Arc<MemoryLogStorage>,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self {
            admin: Arc::new(MemoryAdminStorage::new()),
            log: Arc::new(MemoryLogStorage),
        }
    }

    /// Concrete handle to the admin storage, for seeding and inspection.
    pub fn admin(&self) -> Arc<MemoryAdminStorage> {
        Arc::clone(&self.admin)
    }
}

impl Default for MemoryStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorageProvider {
    fn admin_storage(&self) -> Arc<dyn AdminStorage> {
        self.admin.clone()
    }

    fn log_storage(&self) -> Arc<dyn LogStorage> {
        self.log.clone()
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.admin.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tree_lifecycle() {
        let storage = MemoryAdminStorage::new();
        let tree = storage.create_tree(TreeType::Log, "audit").await.unwrap();
        assert_eq!(tree.tree_id, 1);

        // Live trees cannot be purged.
        assert_eq!(
            storage.hard_delete_tree(tree.tree_id).await,
            Err(StorageError::NotDeleted(tree.tree_id))
        );

        storage.soft_delete_tree(tree.tree_id).await.unwrap();
        assert!(storage.list_trees(false).await.unwrap().is_empty());
        assert_eq!(storage.list_trees(true).await.unwrap().len(), 1);

        storage.hard_delete_tree(tree.tree_id).await.unwrap();
        assert!(storage.is_empty());

        // Purging again is a no-op.
        assert_eq!(storage.hard_delete_tree(tree.tree_id).await, Ok(()));
    }

    #[tokio::test]
    async fn undelete_restores_tree() {
        let storage = MemoryAdminStorage::new();
        let tree = storage.create_tree(TreeType::PreorderedLog, "mirror").await.unwrap();
        storage.soft_delete_tree(tree.tree_id).await.unwrap();
        assert_eq!(
            storage.soft_delete_tree(tree.tree_id).await,
            Err(StorageError::AlreadyDeleted(tree.tree_id))
        );

        let restored = storage.undelete_tree(tree.tree_id).await.unwrap();
        assert!(!restored.is_deleted());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn undeleted_tree_survives_concurrent_purge() {
        let storage = Arc::new(MemoryAdminStorage::new());
        for _ in 0..200 {
            let tree = storage.create_tree(TreeType::Log, "contested").await.unwrap();
            storage.soft_delete_tree(tree.tree_id).await.unwrap();

            let restore = {
                let storage = storage.clone();
                tokio::spawn(async move { storage.undelete_tree(tree.tree_id).await })
            };
            let purge = {
                let storage = storage.clone();
                tokio::spawn(async move { storage.hard_delete_tree(tree.tree_id).await })
            };
            let restored = restore.await.unwrap();
            let purged = purge.await.unwrap();

            match (restored, purged) {
                (Ok(_), Err(StorageError::NotDeleted(_))) => {
                    assert!(!storage.get_tree(tree.tree_id).await.unwrap().is_deleted());
                }
                (Err(StorageError::NotFound(_)), Ok(())) => {
                    assert!(storage.get_tree(tree.tree_id).await.is_err());
                }
                other => panic!("restore and purge both claimed tree: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn inserted_ids_are_not_reused() {
        let storage = MemoryAdminStorage::new();
        storage.insert_tree(Tree {
            tree_id: 40,
            tree_type: TreeType::Log,
            display_name: "seeded".into(),
            create_time: SystemTime::now(),
            delete_time: None,
        });
        let tree = storage.create_tree(TreeType::Log, "next").await.unwrap();
        assert_eq!(tree.tree_id, 41);
    }

    #[tokio::test]
    async fn closed_provider_fails_health_check() {
        let provider = MemoryStorageProvider::new();
        let admin = provider.admin_storage();
        assert!(admin.check_database_accessible().await.is_ok());

        provider.close().await.unwrap();
        assert_eq!(admin.check_database_accessible().await, Err(StorageError::Closed));
    }
}
