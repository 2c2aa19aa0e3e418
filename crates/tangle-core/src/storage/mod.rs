//! # Storage Backends
//!
//! Record stores implementing [`NodeRepository`]:
//! - `MemoryStore`: in-memory `BTreeMap` (fast, volatile)
//! - `RedbStore`: disk-backed redb database (ACID, persistent)
//!
//! `StorageBackend` picks one at runtime so the binary can switch backends
//! from configuration without making the engine generic over the choice.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::repository::NodeRepository;
use crate::{Checkpoint, Node, NodeId, TangleError};
use std::path::Path;

/// Storage backend selected at runtime.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// Open or create a redb-backed store at the given path.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, TangleError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    /// Short name of the backend, as used in configuration.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "memory",
            Self::Persistent(_) => "redb",
        }
    }
}

impl NodeRepository for StorageBackend {
    fn put_node(&mut self, node: &Node) -> Result<(), TangleError> {
        match self {
            Self::InMemory(store) => store.put_node(node),
            Self::Persistent(store) => store.put_node(node),
        }
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>, TangleError> {
        match self {
            Self::InMemory(store) => store.get_node(id),
            Self::Persistent(store) => store.get_node(id),
        }
    }

    fn get_all_nodes(&self) -> Result<Vec<Node>, TangleError> {
        match self {
            Self::InMemory(store) => store.get_all_nodes(),
            Self::Persistent(store) => store.get_all_nodes(),
        }
    }

    fn node_count(&self) -> Result<usize, TangleError> {
        match self {
            Self::InMemory(store) => store.node_count(),
            Self::Persistent(store) => store.node_count(),
        }
    }

    fn put_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<(), TangleError> {
        match self {
            Self::InMemory(store) => store.put_checkpoint(checkpoint),
            Self::Persistent(store) => store.put_checkpoint(checkpoint),
        }
    }

    fn get_checkpoint(&self, id: &str) -> Result<Option<Checkpoint>, TangleError> {
        match self {
            Self::InMemory(store) => store.get_checkpoint(id),
            Self::Persistent(store) => store.get_checkpoint(id),
        }
    }

    fn get_latest_checkpoint(&self) -> Result<Option<Checkpoint>, TangleError> {
        match self {
            Self::InMemory(store) => store.get_latest_checkpoint(),
            Self::Persistent(store) => store.get_latest_checkpoint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_is_in_memory() {
        let backend = StorageBackend::default();
        assert!(!backend.is_persistent());
        assert_eq!(backend.name(), "memory");
    }

    #[test]
    fn redb_backend_dispatches() {
        let temp = tempdir().expect("temp dir");
        let mut backend = StorageBackend::redb(temp.path().join("b.redb")).expect("open");
        assert!(backend.is_persistent());

        backend
            .put_node(&Node::new(NodeId::new("a"), vec![], 0))
            .expect("put");
        assert_eq!(backend.node_count().expect("count"), 1);
        assert!(backend.contains_node(&NodeId::new("a")).expect("contains"));
    }
}
