//! # Repository Contract
//!
//! The interface the engine uses to reach the record store.
//!
//! A repository is a dumb accessor: it enforces no graph invariant. Every
//! method is a direct, non-batched operation. A missing record or checkpoint
//! is `Ok(None)`, so callers can always tell "not found" apart from a failing
//! store.

use crate::{Checkpoint, Node, NodeId, TangleError};

/// Storage operations consumed by [`crate::Tangle`].
///
/// Implementations are not required to be safe for concurrent writers; the
/// engine serializes its own calls.
pub trait NodeRepository {
    /// Insert or overwrite a record.
    fn put_node(&mut self, node: &Node) -> Result<(), TangleError>;

    /// Fetch a record by id.
    fn get_node(&self, id: &NodeId) -> Result<Option<Node>, TangleError>;

    /// Every stored record, in id order.
    fn get_all_nodes(&self) -> Result<Vec<Node>, TangleError>;

    /// Number of stored records.
    fn node_count(&self) -> Result<usize, TangleError> {
        Ok(self.get_all_nodes()?.len())
    }

    /// Check whether a record is stored.
    fn contains_node(&self, id: &NodeId) -> Result<bool, TangleError> {
        Ok(self.get_node(id)?.is_some())
    }

    /// Insert a checkpoint.
    fn put_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<(), TangleError>;

    /// Fetch a checkpoint by id.
    fn get_checkpoint(&self, id: &str) -> Result<Option<Checkpoint>, TangleError>;

    /// The checkpoint with the greatest timestamp, if any.
    fn get_latest_checkpoint(&self) -> Result<Option<Checkpoint>, TangleError>;
}

/// Pick the latest of a sequence of checkpoints.
///
/// Greatest timestamp wins; on equal timestamps the first seen is kept.
pub(crate) fn latest_of(checkpoints: impl IntoIterator<Item = Checkpoint>) -> Option<Checkpoint> {
    let mut latest: Option<Checkpoint> = None;
    for cp in checkpoints {
        if latest.as_ref().is_none_or(|l| cp.timestamp > l.timestamp) {
            latest = Some(cp);
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp(id: &str, timestamp: i64) -> Checkpoint {
        Checkpoint {
            id: id.to_string(),
            timestamp,
            root_hash: String::new(),
            node_count: 0,
        }
    }

    #[test]
    fn latest_of_picks_max_timestamp() {
        let latest = latest_of(vec![cp("a", 5), cp("b", 9), cp("c", 7)]);
        assert_eq!(latest.map(|c| c.id), Some("b".to_string()));
    }

    #[test]
    fn latest_of_keeps_first_on_tie() {
        let latest = latest_of(vec![cp("a", 5), cp("b", 5)]);
        assert_eq!(latest.map(|c| c.id), Some("a".to_string()));
    }

    #[test]
    fn latest_of_empty() {
        assert!(latest_of(Vec::new()).is_none());
    }
}
