//! # redb-backed Record Store
//!
//! A disk-backed record store using the redb embedded database, providing:
//! - ACID transactions (one per write)
//! - Crash safety (copy-on-write B-trees)
//! - Key-ordered iteration, so full scans come back in id order
//!
//! Records and checkpoints are postcard-encoded and kept in separate tables.

use crate::repository::{NodeRepository, latest_of};
use crate::{Checkpoint, Node, NodeId, TangleError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// String-keyed table of postcard-encoded values.
type BytesTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Table for records: record id -> serialized Node bytes
const NODES: BytesTable = TableDefinition::new("nodes");

/// Table for checkpoints: checkpoint id -> serialized Checkpoint bytes
const CHECKPOINTS: BytesTable = TableDefinition::new("checkpoints");

fn io_err(e: impl std::fmt::Display) -> TangleError {
    TangleError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TangleError> {
    postcard::to_allocvec(value).map_err(|e| TangleError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TangleError> {
    postcard::from_bytes(bytes).map_err(|e| TangleError::DeserializationError(e.to_string()))
}

/// A disk-backed record store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TangleError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(NODES).map_err(io_err)?;
            let _ = write_txn.open_table(CHECKPOINTS).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    fn put_bytes(
        &self,
        table: BytesTable,
        key: &str,
        bytes: &[u8],
    ) -> Result<(), TangleError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut t = write_txn.open_table(table).map_err(io_err)?;
            t.insert(key, bytes).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)
    }

    fn get_decoded<T: DeserializeOwned>(
        &self,
        table: BytesTable,
        key: &str,
    ) -> Result<Option<T>, TangleError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let t = read_txn.open_table(table).map_err(io_err)?;
        match t.get(key).map_err(io_err)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn scan_decoded<T: DeserializeOwned>(
        &self,
        table: BytesTable,
    ) -> Result<Vec<T>, TangleError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let t = read_txn.open_table(table).map_err(io_err)?;

        let mut values = Vec::new();
        for entry in t.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            values.push(decode(value.value())?);
        }
        Ok(values)
    }
}

// =============================================================================
// REPOSITORY IMPLEMENTATION
// =============================================================================

impl NodeRepository for RedbStore {
    fn put_node(&mut self, node: &Node) -> Result<(), TangleError> {
        let bytes = encode(node)?;
        self.put_bytes(NODES, node.id.as_str(), &bytes)
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>, TangleError> {
        self.get_decoded(NODES, id.as_str())
    }

    fn get_all_nodes(&self) -> Result<Vec<Node>, TangleError> {
        self.scan_decoded(NODES)
    }

    fn node_count(&self) -> Result<usize, TangleError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let t = read_txn.open_table(NODES).map_err(io_err)?;
        let len = t.len().map_err(io_err)?;
        Ok(usize::try_from(len).unwrap_or(usize::MAX))
    }

    fn put_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<(), TangleError> {
        let bytes = encode(checkpoint)?;
        self.put_bytes(CHECKPOINTS, &checkpoint.id, &bytes)
    }

    fn get_checkpoint(&self, id: &str) -> Result<Option<Checkpoint>, TangleError> {
        self.get_decoded(CHECKPOINTS, id)
    }

    fn get_latest_checkpoint(&self) -> Result<Option<Checkpoint>, TangleError> {
        Ok(latest_of(self.scan_decoded::<Checkpoint>(CHECKPOINTS)?))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn node(id: &str, parents: &[&str]) -> Node {
        Node::new(
            NodeId::new(id),
            parents.iter().map(|p| NodeId::new(*p)).collect(),
            1_700_000_000_000,
        )
    }

    #[test]
    fn put_and_get_node() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let mut a = node("a", &[]);
        a.weight = 3;
        a.cumulative_weight = 7;
        store.put_node(&a).expect("put");

        assert_eq!(store.get_node(&NodeId::new("a")).expect("get"), Some(a));
        assert_eq!(store.get_node(&NodeId::new("missing")).expect("get"), None);
    }

    #[test]
    fn put_overwrites() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let mut a = node("a", &[]);
        store.put_node(&a).expect("put");
        a.record_approval();
        store.put_node(&a).expect("put");

        let stored = store.get_node(&NodeId::new("a")).expect("get");
        assert_eq!(stored.map(|n| n.weight), Some(1));
        assert_eq!(store.node_count().expect("count"), 1);
    }

    #[test]
    fn scan_returns_id_order() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        for id in ["m", "b", "z", "a"] {
            store.put_node(&node(id, &[])).expect("put");
        }

        let ids: Vec<String> = store
            .get_all_nodes()
            .expect("all")
            .into_iter()
            .map(|n| n.id.0)
            .collect();
        assert_eq!(ids, vec!["a", "b", "m", "z"]);
    }

    #[test]
    fn checkpoints_do_not_leak_into_node_scan() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        store.put_node(&node("a", &[])).expect("put");
        store
            .put_checkpoint(&Checkpoint {
                id: "cp1".to_string(),
                timestamp: 10,
                root_hash: "ab".to_string(),
                node_count: 1,
            })
            .expect("put checkpoint");

        assert_eq!(store.get_all_nodes().expect("all").len(), 1);
        assert!(store.get_checkpoint("cp1").expect("get").is_some());
        assert!(store.get_checkpoint("cp2").expect("get").is_none());
    }

    #[test]
    fn latest_checkpoint_by_timestamp_not_key() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        assert!(store.get_latest_checkpoint().expect("latest").is_none());

        for (id, ts) in [("b", 300), ("a", 100), ("c", 200)] {
            store
                .put_checkpoint(&Checkpoint {
                    id: id.to_string(),
                    timestamp: ts,
                    root_hash: String::new(),
                    node_count: 0,
                })
                .expect("put");
        }

        let latest = store.get_latest_checkpoint().expect("latest");
        assert_eq!(latest.map(|c| c.id), Some("b".to_string()));
    }

    #[test]
    fn recovery_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        // Phase 1: write records and a checkpoint
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store.put_node(&node("a", &[])).expect("put");
            store.put_node(&node("b", &["a"])).expect("put");
            store
                .put_checkpoint(&Checkpoint {
                    id: "cp".to_string(),
                    timestamp: 5,
                    root_hash: "ff".to_string(),
                    node_count: 2,
                })
                .expect("put checkpoint");
        }

        // Phase 2: reopen and verify
        {
            let store = RedbStore::open(&db_path).expect("reopen db");
            assert_eq!(store.node_count().expect("count"), 2);
            let b = store.get_node(&NodeId::new("b")).expect("get").expect("b");
            assert_eq!(b.parents, vec![NodeId::new("a")]);
            assert_eq!(
                store.get_latest_checkpoint().expect("latest").map(|c| c.node_count),
                Some(2)
            );
        }
    }

    #[test]
    fn recovery_multiple_reopen_cycles() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        for (cycle, id) in ["a", "b", "c"].iter().enumerate() {
            let mut store = RedbStore::open(&db_path).expect("open db");
            assert_eq!(store.node_count().expect("count"), cycle);
            store.put_node(&node(id, &[])).expect("put");
        }

        let store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.node_count().expect("count"), 3);
    }
}
