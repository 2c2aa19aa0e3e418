//! # Core Type Definitions
//!
//! This module contains all core types for the approval tangle:
//! - Record identifiers and records (`NodeId`, `Node`)
//! - Checkpoints (`Checkpoint`)
//! - Approval outcome and its non-fatal warnings (`Approval`, `PropagationWarning`)
//! - Error types (`TangleError`, `ErrorKind`)
//!
//! ## Ordering Guarantees
//!
//! All identifier types implement `Ord` so that every collection built by the
//! engine (`BTreeMap`/`BTreeSet`) iterates in key order. Two runs over the same
//! record set visit records in the same order.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// RECORD IDENTIFIER
// =============================================================================

/// Caller-supplied identifier of a record in the tangle.
///
/// Identifiers are immutable once a record is admitted. Validation of the
/// contents (length, control characters) happens in [`crate::validation`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// NODE (RECORD)
// =============================================================================

/// A record in the approval graph.
///
/// `parents` lists the records this record approves. `weight` counts the
/// records that list this one as a parent; `cumulative_weight` adds the weight
/// of every distinct descendant reachable through approvals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique record identifier.
    pub id: NodeId,
    /// Records approved by this record, in declaration order.
    pub parents: Vec<NodeId>,
    /// Number of direct approvals.
    pub weight: u32,
    /// Own weight plus the weight of every descendant.
    pub cumulative_weight: i64,
    /// Admission time in milliseconds since the UNIX epoch.
    pub created_at: i64,
}

impl Node {
    /// Create a fresh record with zero weights.
    #[must_use]
    pub fn new(id: NodeId, parents: Vec<NodeId>, created_at: i64) -> Self {
        Self {
            id,
            parents,
            weight: 0,
            cumulative_weight: 0,
            created_at,
        }
    }

    /// Record one more direct approval, saturating at `u32::MAX`.
    pub fn record_approval(&mut self) {
        self.weight = self.weight.saturating_add(1);
    }

    /// True if this record approves nothing (created via plain admission).
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.parents.is_empty()
    }
}

// =============================================================================
// CHECKPOINT
// =============================================================================

/// Immutable summary of the graph at the moment it was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Caller-chosen checkpoint name.
    pub id: String,
    /// Creation time in milliseconds since the UNIX epoch.
    pub timestamp: i64,
    /// Hex BLAKE3 fingerprint of the record set.
    pub root_hash: String,
    /// Number of records stored when the checkpoint was taken.
    pub node_count: u64,
}

// =============================================================================
// APPROVAL OUTCOME
// =============================================================================

/// Non-fatal problem met while propagating weights after a record was
/// durably admitted.
///
/// These never roll the admission back. Drift they leave behind is what
/// [`crate::Tangle::validate_consistency`] reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropagationWarning {
    /// A parent disappeared between validation and the weight increment.
    ParentMissing { parent: NodeId },
    /// The incremented parent could not be written back.
    ParentUpdateFailed { parent: NodeId, reason: String },
    /// The cumulative weight of one ancestor could not be recomputed or stored.
    RecomputeFailed { node: NodeId, reason: String },
}

impl fmt::Display for PropagationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentMissing { parent } => {
                write!(f, "parent {} missing during weight update", parent)
            }
            Self::ParentUpdateFailed { parent, reason } => {
                write!(f, "failed updating weight of parent {}: {}", parent, reason)
            }
            Self::RecomputeFailed { node, reason } => {
                write!(f, "failed recomputing cumulative weight of {}: {}", node, reason)
            }
        }
    }
}

/// Result of a successful approval: the admitted record plus any warnings
/// raised while propagating weights to its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub node: Node,
    pub warnings: Vec<PropagationWarning>,
}

impl Approval {
    /// True if weight propagation completed without any warning.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse classification of [`TangleError`], used by outer layers to pick a
/// status code or exit code without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    Validation,
    NotFound,
    EmptyGraph,
    ResourceExceeded,
    Storage,
}

/// Errors that can occur in the tangle engine.
///
/// - No silent failures
/// - Use `Result<T, TangleError>` for fallible operations
/// - Validation errors are raised before any write
#[derive(Debug, Error)]
pub enum TangleError {
    /// A record with this id is already stored.
    #[error("node with ID {0} already exists")]
    AlreadyExists(NodeId),

    /// A checkpoint with this id is already stored.
    #[error("checkpoint {0} already exists")]
    CheckpointExists(String),

    /// The record names itself as a parent.
    #[error("node {0} cannot approve itself")]
    SelfReference(NodeId),

    /// Adding the declared edges would close a loop.
    #[error("approving {parent} from {node} would create a cycle")]
    CycleDetected { node: NodeId, parent: NodeId },

    /// A declared parent is not stored.
    #[error("parent node {0} does not exist")]
    ParentNotFound(NodeId),

    /// An approval declared no parent at all.
    #[error("approved node {0} must reference at least one parent")]
    MissingParents(NodeId),

    /// An approval declared more parents than allowed.
    #[error("node {node} declares {count} parents, maximum is {max}")]
    TooManyParents {
        node: NodeId,
        count: usize,
        max: usize,
    },

    /// The identifier is empty, too long, or otherwise malformed.
    #[error("invalid identifier: {0}")]
    InvalidNodeId(String),

    /// Walk parameters are out of range.
    #[error("invalid walk parameters: {0}")]
    InvalidWalkParams(String),

    /// The requested record was not found.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// No checkpoint has been stored yet.
    #[error("no checkpoint found")]
    CheckpointNotFound,

    /// An aggregate query ran on a graph with zero records.
    #[error("no nodes in DAG")]
    EmptyGraph,

    /// Tip selection ran on a graph with zero records.
    #[error("no nodes available for tip selection")]
    NoNodes,

    /// A walk descent exceeded its step bound.
    #[error("tip selection exceeded {0} steps")]
    WalkStepLimitExceeded(usize),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl TangleError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyExists(_) | Self::CheckpointExists(_) => ErrorKind::Conflict,
            Self::SelfReference(_)
            | Self::CycleDetected { .. }
            | Self::ParentNotFound(_)
            | Self::MissingParents(_)
            | Self::TooManyParents { .. }
            | Self::InvalidNodeId(_)
            | Self::InvalidWalkParams(_) => ErrorKind::Validation,
            Self::NodeNotFound(_) | Self::CheckpointNotFound => ErrorKind::NotFound,
            Self::EmptyGraph | Self::NoNodes => ErrorKind::EmptyGraph,
            Self::WalkStepLimitExceeded(_) => ErrorKind::ResourceExceeded,
            Self::SerializationError(_) | Self::DeserializationError(_) | Self::IoError(_) => {
                ErrorKind::Storage
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_approval_saturates() {
        let mut node = Node::new(NodeId::new("a"), vec![], 0);
        node.weight = u32::MAX;
        node.record_approval();
        assert_eq!(node.weight, u32::MAX);
    }

    #[test]
    fn new_node_starts_unweighted() {
        let node = Node::new(NodeId::new("b"), vec![NodeId::new("a")], 42);
        assert_eq!(node.weight, 0);
        assert_eq!(node.cumulative_weight, 0);
        assert_eq!(node.created_at, 42);
        assert!(!node.is_genesis());
    }

    #[test]
    fn node_id_ordering_is_lexicographic() {
        let mut ids = vec![NodeId::new("c"), NodeId::new("a"), NodeId::new("b")];
        ids.sort();
        assert_eq!(ids, vec![NodeId::new("a"), NodeId::new("b"), NodeId::new("c")]);
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            TangleError::AlreadyExists(NodeId::new("x")).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            TangleError::CycleDetected {
                node: NodeId::new("a"),
                parent: NodeId::new("c"),
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(TangleError::CheckpointNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(TangleError::NoNodes.kind(), ErrorKind::EmptyGraph);
        assert_eq!(
            TangleError::WalkStepLimitExceeded(10).kind(),
            ErrorKind::ResourceExceeded
        );
    }

    #[test]
    fn node_id_encodes_as_plain_string() {
        // Length-prefixed bytes, no wrapper struct.
        let bytes = postcard::to_allocvec(&NodeId::new("abc")).expect("serialize");
        assert_eq!(bytes, b"\x03abc".to_vec());
    }
}
