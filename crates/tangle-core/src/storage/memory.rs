//! # In-Memory Record Store
//!
//! Volatile `BTreeMap` storage. Used for tests, benchmarks and the `memory`
//! backend of the binary.

use crate::repository::{NodeRepository, latest_of};
use crate::{Checkpoint, Node, NodeId, TangleError};
use std::collections::BTreeMap;

/// Record store kept entirely in memory.
///
/// Uses `BTreeMap` so `get_all_nodes` returns records in id order, the same
/// order the redb store produces.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    nodes: BTreeMap<NodeId, Node>,
    checkpoints: BTreeMap<String, Checkpoint>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checkpoints.
    #[must_use]
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }
}

impl NodeRepository for MemoryStore {
    fn put_node(&mut self, node: &Node) -> Result<(), TangleError> {
        self.nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>, TangleError> {
        Ok(self.nodes.get(id).cloned())
    }

    fn get_all_nodes(&self) -> Result<Vec<Node>, TangleError> {
        Ok(self.nodes.values().cloned().collect())
    }

    fn node_count(&self) -> Result<usize, TangleError> {
        Ok(self.nodes.len())
    }

    fn contains_node(&self, id: &NodeId) -> Result<bool, TangleError> {
        Ok(self.nodes.contains_key(id))
    }

    fn put_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<(), TangleError> {
        self.checkpoints
            .insert(checkpoint.id.clone(), checkpoint.clone());
        Ok(())
    }

    fn get_checkpoint(&self, id: &str) -> Result<Option<Checkpoint>, TangleError> {
        Ok(self.checkpoints.get(id).cloned())
    }

    fn get_latest_checkpoint(&self) -> Result<Option<Checkpoint>, TangleError> {
        Ok(latest_of(self.checkpoints.values().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_node() {
        let mut store = MemoryStore::new();
        let node = Node::new(NodeId::new("a"), vec![], 1);
        store.put_node(&node).expect("put");

        assert_eq!(store.get_node(&NodeId::new("a")).expect("get"), Some(node));
        assert_eq!(store.get_node(&NodeId::new("zz")).expect("get"), None);
        assert!(store.contains_node(&NodeId::new("a")).expect("contains"));
    }

    #[test]
    fn all_nodes_in_id_order() {
        let mut store = MemoryStore::new();
        for id in ["c", "a", "b"] {
            store.put_node(&Node::new(NodeId::new(id), vec![], 0)).expect("put");
        }
        let ids: Vec<String> = store
            .get_all_nodes()
            .expect("all")
            .into_iter()
            .map(|n| n.id.0)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.node_count().expect("count"), 3);
    }

    #[test]
    fn latest_checkpoint_by_timestamp() {
        let mut store = MemoryStore::new();
        assert!(store.get_latest_checkpoint().expect("latest").is_none());

        for (id, ts) in [("z-old", 10), ("a-new", 20)] {
            store
                .put_checkpoint(&Checkpoint {
                    id: id.to_string(),
                    timestamp: ts,
                    root_hash: "00".to_string(),
                    node_count: 0,
                })
                .expect("put");
        }

        let latest = store.get_latest_checkpoint().expect("latest");
        assert_eq!(latest.map(|c| c.id), Some("a-new".to_string()));
        assert_eq!(store.checkpoint_count(), 2);
    }
}
