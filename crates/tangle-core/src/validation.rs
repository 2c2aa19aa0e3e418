//! # Input Validation
//!
//! Structural checks on identifiers and parent lists, applied before the
//! engine touches the store.

use crate::primitives::{MAX_NODE_ID_LENGTH, MAX_PARENTS};
use crate::{NodeId, TangleError};
use std::collections::BTreeSet;

/// Validate a record or checkpoint identifier.
///
/// Rejects empty identifiers, identifiers longer than `MAX_NODE_ID_LENGTH`
/// bytes, and identifiers containing control characters.
pub fn validate_identifier(id: &str) -> Result<(), TangleError> {
    if id.is_empty() {
        return Err(TangleError::InvalidNodeId("identifier is empty".to_string()));
    }
    if id.len() > MAX_NODE_ID_LENGTH {
        return Err(TangleError::InvalidNodeId(format!(
            "identifier length {} exceeds maximum {} bytes",
            id.len(),
            MAX_NODE_ID_LENGTH
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(TangleError::InvalidNodeId(
            "identifier contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate a record identifier.
pub fn validate_node_id(id: &NodeId) -> Result<(), TangleError> {
    validate_identifier(id.as_str())
}

/// Validate the parent list of an approval and collapse duplicates.
///
/// The first occurrence of each parent keeps its position, so the stored
/// list is an ordered set. Self-reference is checked by the engine, which
/// owns that error ordering.
pub fn normalize_parents(node: &NodeId, parents: Vec<NodeId>) -> Result<Vec<NodeId>, TangleError> {
    if parents.is_empty() {
        return Err(TangleError::MissingParents(node.clone()));
    }

    let mut seen = BTreeSet::new();
    let mut unique = Vec::with_capacity(parents.len());
    for parent in parents {
        if seen.insert(parent.clone()) {
            unique.push(parent);
        }
    }

    if unique.len() > MAX_PARENTS {
        return Err(TangleError::TooManyParents {
            node: node.clone(),
            count: unique.len(),
            max: MAX_PARENTS,
        });
    }

    for parent in &unique {
        validate_identifier(parent.as_str())?;
    }
    Ok(unique)
}
