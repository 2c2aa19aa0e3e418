//! # Consistency Verification
//!
//! Recomputes every record's cumulative weight from the stored parent lists
//! and compares it with the persisted value. Drift left behind by failed
//! propagation writes shows up here as mismatches.

use crate::graph::Adjacency;
use crate::primitives::FULL_CONSISTENCY_MILLIONTHS;
use crate::{Node, NodeId};
use serde::{Deserialize, Serialize};

/// Overall verdict of a consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyStatus {
    Consistent,
    Inconsistent,
}

/// One record whose persisted cumulative weight differs from the recomputed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub node_id: NodeId,
    /// Recomputed value.
    pub expected: i64,
    /// Persisted value.
    pub actual: i64,
    /// `expected - actual`.
    pub difference: i64,
}

/// Result of [`crate::Tangle::validate_consistency`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub total_nodes: u64,
    pub valid_nodes: u64,
    /// Ordered by node id.
    pub mismatches: Vec<Mismatch>,
    pub status: ConsistencyStatus,
    /// Share of valid nodes in millionths (1_000_000 = all valid).
    pub consistency_millionths: u64,
}

impl ConsistencyReport {
    /// Compare persisted weights in `nodes` against a fresh recomputation.
    #[must_use]
    pub fn compute(nodes: &[Node]) -> Self {
        let expected = Adjacency::build(nodes).cumulative_weight_map();

        let mut sorted: Vec<&Node> = nodes.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mismatches: Vec<Mismatch> = sorted
            .into_iter()
            .filter_map(|node| {
                let want = expected.get(&node.id).copied().unwrap_or(0);
                (want != node.cumulative_weight).then(|| Mismatch {
                    node_id: node.id.clone(),
                    expected: want,
                    actual: node.cumulative_weight,
                    difference: want.saturating_sub(node.cumulative_weight),
                })
            })
            .collect();

        let total_nodes = nodes.len() as u64;
        let valid_nodes = total_nodes.saturating_sub(mismatches.len() as u64);
        let consistency_millionths = if total_nodes == 0 {
            FULL_CONSISTENCY_MILLIONTHS
        } else {
            valid_nodes.saturating_mul(FULL_CONSISTENCY_MILLIONTHS) / total_nodes
        };
        let status = if mismatches.is_empty() {
            ConsistencyStatus::Consistent
        } else {
            ConsistencyStatus::Inconsistent
        };

        Self {
            total_nodes,
            valid_nodes,
            mismatches,
            status,
            consistency_millionths,
        }
    }

    /// True if no record has drifted.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.status == ConsistencyStatus::Consistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parents: &[&str], weight: u32, cumulative: i64) -> Node {
        let mut n = Node::new(
            NodeId::new(id),
            parents.iter().map(|p| NodeId::new(*p)).collect(),
            0,
        );
        n.weight = weight;
        n.cumulative_weight = cumulative;
        n
    }

    #[test]
    fn empty_graph_is_fully_consistent() {
        let report = ConsistencyReport::compute(&[]);
        assert!(report.is_consistent());
        assert_eq!(report.total_nodes, 0);
        assert_eq!(report.consistency_millionths, FULL_CONSISTENCY_MILLIONTHS);
    }

    #[test]
    fn correct_weights_pass() {
        let report =
            ConsistencyReport::compute(&[node("a", &[], 1, 1), node("b", &["a"], 0, 0)]);
        assert!(report.is_consistent());
        assert_eq!(report.valid_nodes, 2);
    }

    #[test]
    fn drift_is_reported() {
        let report =
            ConsistencyReport::compute(&[node("a", &[], 1, 5), node("b", &["a"], 0, 0)]);
        assert_eq!(report.status, ConsistencyStatus::Inconsistent);
        assert_eq!(
            report.mismatches,
            vec![Mismatch {
                node_id: NodeId::new("a"),
                expected: 1,
                actual: 5,
                difference: -4,
            }]
        );
        assert_eq!(report.valid_nodes, 1);
        assert_eq!(report.consistency_millionths, 500_000);
    }

    #[test]
    fn mismatches_ordered_by_id() {
        let report = ConsistencyReport::compute(&[
            node("z", &[], 0, 3),
            node("m", &[], 0, 2),
            node("a", &[], 0, 1),
        ]);
        let ids: Vec<&str> = report.mismatches.iter().map(|m| m.node_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
        assert_eq!(report.consistency_millionths, 0);
    }
}
