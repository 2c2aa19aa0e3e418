//! # Tangle Engine
//!
//! `Tangle` owns a record store and is the only place the approval graph is
//! mutated. It enforces the graph invariants on admission and approval,
//! propagates weights to ancestors, and derives everything else (highest
//! weight queries, tip selection, consistency checks, checkpoints) from the
//! stored records.
//!
//! ## Exclusivity
//!
//! Mutations and tip selection take `&mut self`. Callers sharing an engine
//! across threads wrap it in a lock and hold the write guard for the whole
//! call, so no reader ever sees an approval with half-propagated weights.

use crate::checkpoint::fingerprint;
use crate::clock::{Clock, MonotonicStamp, SystemClock};
use crate::consistency::ConsistencyReport;
use crate::graph::Adjacency;
use crate::repository::NodeRepository;
use crate::validation::{normalize_parents, validate_identifier, validate_node_id};
use crate::walk::{self, WalkParams};
use crate::{Approval, Checkpoint, Node, NodeId, PropagationWarning, TangleError};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// The approval graph engine.
pub struct Tangle<S: NodeRepository> {
    store: S,
    clock: Box<dyn Clock>,
    stamp: MonotonicStamp,
    rng: SmallRng,
}

impl<S: NodeRepository + fmt::Debug> fmt::Debug for Tangle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tangle")
            .field("store", &self.store)
            .field("clock", &self.clock)
            .field("stamp", &self.stamp)
            .finish_non_exhaustive()
    }
}

impl<S: NodeRepository> Tangle<S> {
    /// Open an engine over `store`.
    ///
    /// The timestamp high-water mark starts at the newest stored record, so
    /// records admitted after a restart never predate existing ones. The walk
    /// RNG is seeded from OS entropy.
    pub fn new(store: S) -> Result<Self, TangleError> {
        let newest = store
            .get_all_nodes()?
            .iter()
            .map(|n| n.created_at)
            .max()
            .unwrap_or(0);

        Ok(Self {
            store,
            clock: Box::new(SystemClock),
            stamp: MonotonicStamp::starting_at(newest),
            rng: SmallRng::from_entropy(),
        })
    }

    /// Replace the walk RNG with one seeded from `seed`, for reproducible
    /// tip selection.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Borrow the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutably borrow the underlying store, bypassing every invariant check.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Admit a record with no parents.
    pub fn add_node(&mut self, id: NodeId) -> Result<Node, TangleError> {
        validate_node_id(&id)?;
        if self.store.contains_node(&id)? {
            return Err(TangleError::AlreadyExists(id));
        }

        let node = Node::new(id, Vec::new(), self.stamp.stamp(self.clock.as_ref()));
        self.store.put_node(&node)?;
        debug!(node = %node.id, "node added");
        Ok(node)
    }

    /// Admit a record that approves `parents`, then propagate weights.
    ///
    /// Every validation failure is returned before anything is written. Once
    /// the record is persisted the call succeeds; propagation problems are
    /// returned as warnings in the [`Approval`] and logged.
    pub fn approve_node(
        &mut self,
        id: NodeId,
        parents: Vec<NodeId>,
    ) -> Result<Approval, TangleError> {
        // Raw list: a self-reference outranks every other parent problem.
        if parents.contains(&id) {
            return Err(TangleError::SelfReference(id));
        }
        validate_node_id(&id)?;
        let parents = normalize_parents(&id, parents)?;

        let exists = self.store.contains_node(&id)?;
        if exists {
            self.check_cycle(&id, &parents)?;
        }

        for parent in &parents {
            if !self.store.contains_node(parent)? {
                return Err(TangleError::ParentNotFound(parent.clone()));
            }
        }

        if exists {
            return Err(TangleError::AlreadyExists(id));
        }

        let node = Node::new(id, parents, self.stamp.stamp(self.clock.as_ref()));
        self.store.put_node(&node)?;

        let mut warnings = self.increment_parents(&node.parents);
        warnings.extend(self.recompute_ancestors(&node));

        for warning in &warnings {
            warn!(node = %node.id, "{}", warning);
        }
        debug!(
            node = %node.id,
            parents = node.parents.len(),
            warnings = warnings.len(),
            "node approved"
        );

        Ok(Approval { node, warnings })
    }

    /// Fail if `id` can already be reached upwards from one of `parents`,
    /// i.e. if approving them from `id` would close a loop.
    fn check_cycle(&self, id: &NodeId, parents: &[NodeId]) -> Result<(), TangleError> {
        let adj = Adjacency::build(&self.store.get_all_nodes()?);
        let Some(target) = adj.index_of(id) else {
            return Ok(());
        };

        for parent in parents {
            if adj
                .index_of(parent)
                .is_some_and(|p| adj.reaches_upward(p, target))
            {
                return Err(TangleError::CycleDetected {
                    node: id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        Ok(())
    }

    fn increment_parents(&mut self, parents: &[NodeId]) -> Vec<PropagationWarning> {
        let mut warnings = Vec::new();

        for parent in parents {
            match self.store.get_node(parent) {
                Ok(Some(mut record)) => {
                    record.record_approval();
                    if let Err(e) = self.store.put_node(&record) {
                        warnings.push(PropagationWarning::ParentUpdateFailed {
                            parent: parent.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
                Ok(None) => warnings.push(PropagationWarning::ParentMissing {
                    parent: parent.clone(),
                }),
                Err(e) => warnings.push(PropagationWarning::ParentUpdateFailed {
                    parent: parent.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        warnings
    }

    /// Recompute and store the cumulative weight of every ancestor of `node`
    /// from a fresh adjacency. Only records whose value changed are written.
    fn recompute_ancestors(&mut self, node: &Node) -> Vec<PropagationWarning> {
        let nodes = match self.store.get_all_nodes() {
            Ok(nodes) => nodes,
            Err(e) => {
                return vec![PropagationWarning::RecomputeFailed {
                    node: node.id.clone(),
                    reason: e.to_string(),
                }];
            }
        };

        let adj = Adjacency::build(&nodes);
        let starts: Vec<usize> = node
            .parents
            .iter()
            .filter_map(|p| adj.index_of(p))
            .collect();
        let closure = adj.ancestor_closure(&starts);
        let weights = adj.cumulative_weights_of(&closure);
        let by_id: BTreeMap<&NodeId, &Node> = nodes.iter().map(|n| (&n.id, n)).collect();

        let mut warnings = Vec::new();
        for (idx, weight) in weights {
            let Some(stored) = by_id.get(adj.id(idx)) else {
                continue;
            };
            if stored.cumulative_weight == weight {
                continue;
            }

            let mut updated = (*stored).clone();
            updated.cumulative_weight = weight;
            if let Err(e) = self.store.put_node(&updated) {
                warnings.push(PropagationWarning::RecomputeFailed {
                    node: updated.id,
                    reason: e.to_string(),
                });
            }
        }
        warnings
    }

    // =========================================================================
    // AGGREGATE QUERIES
    // =========================================================================

    /// The record with the most direct approvals. Ties go to the lowest id.
    pub fn highest_weight_node(&self) -> Result<Node, TangleError> {
        self.max_by_key(|n| i64::from(n.weight))
    }

    /// The record with the highest persisted cumulative weight. Ties go to
    /// the lowest id.
    pub fn highest_cumulative_weight_node(&self) -> Result<Node, TangleError> {
        self.max_by_key(|n| n.cumulative_weight)
    }

    fn max_by_key(&self, key: impl Fn(&Node) -> i64) -> Result<Node, TangleError> {
        let mut best: Option<Node> = None;
        for node in self.store.get_all_nodes()? {
            if best.as_ref().is_none_or(|b| key(&node) > key(b)) {
                best = Some(node);
            }
        }
        best.ok_or(TangleError::EmptyGraph)
    }

    /// Pick a tip with the MCMC walk.
    ///
    /// The walk ranks tips by cumulative weights recomputed from the parent
    /// lists, never by persisted values that may have drifted.
    pub fn select_tip(&mut self, params: WalkParams) -> Result<Node, TangleError> {
        params.validate()?;

        let nodes = self.store.get_all_nodes()?;
        if nodes.is_empty() {
            return Err(TangleError::NoNodes);
        }

        let adj = Adjacency::build(&nodes);
        let outcome = walk::run(&adj, &params, &mut self.rng)?;
        let tip = adj.id(outcome.tip);

        debug!(
            tip = %tip,
            steps = params.max_steps,
            accepted = outcome.accepted,
            perturbations = outcome.perturbations,
            "tip selected"
        );

        self.get_node(tip)
    }

    /// Compare persisted cumulative weights with a fresh recomputation.
    pub fn validate_consistency(&self) -> Result<ConsistencyReport, TangleError> {
        let report = ConsistencyReport::compute(&self.store.get_all_nodes()?);
        if !report.is_consistent() {
            warn!(
                mismatches = report.mismatches.len(),
                total = report.total_nodes,
                "cumulative weight drift detected"
            );
        }
        Ok(report)
    }

    // =========================================================================
    // POINT QUERIES
    // =========================================================================

    /// Fetch one record.
    pub fn get_node(&self, id: &NodeId) -> Result<Node, TangleError> {
        self.store
            .get_node(id)?
            .ok_or_else(|| TangleError::NodeNotFound(id.clone()))
    }

    /// Every record, in id order.
    pub fn get_all_nodes(&self) -> Result<Vec<Node>, TangleError> {
        self.store.get_all_nodes()
    }

    /// Number of records.
    pub fn node_count(&self) -> Result<usize, TangleError> {
        self.store.node_count()
    }

    /// Ids of the records nothing approves yet, in id order.
    pub fn tips(&self) -> Result<Vec<NodeId>, TangleError> {
        let adj = Adjacency::build(&self.store.get_all_nodes()?);
        Ok(adj.tips().into_iter().map(|i| adj.id(i).clone()).collect())
    }

    // =========================================================================
    // CHECKPOINTS
    // =========================================================================

    /// Snapshot the record count and fingerprint under a new checkpoint id.
    pub fn create_checkpoint(&mut self, id: &str) -> Result<Checkpoint, TangleError> {
        validate_identifier(id)?;
        if self.store.get_checkpoint(id)?.is_some() {
            return Err(TangleError::CheckpointExists(id.to_string()));
        }

        let nodes = self.store.get_all_nodes()?;
        let root_hash = fingerprint(&nodes)?;
        let timestamp = match self.store.get_latest_checkpoint()? {
            Some(latest) => self.stamp.stamp_after(self.clock.as_ref(), latest.timestamp),
            None => self.stamp.stamp(self.clock.as_ref()),
        };

        let checkpoint = Checkpoint {
            id: id.to_string(),
            timestamp,
            root_hash,
            node_count: nodes.len() as u64,
        };
        self.store.put_checkpoint(&checkpoint)?;
        debug!(checkpoint = %checkpoint.id, nodes = checkpoint.node_count, "checkpoint created");
        Ok(checkpoint)
    }

    /// The checkpoint with the greatest timestamp.
    pub fn latest_checkpoint(&self) -> Result<Checkpoint, TangleError> {
        self.store
            .get_latest_checkpoint()?
            .ok_or(TangleError::CheckpointNotFound)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::MemoryStore;

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn engine() -> Tangle<MemoryStore> {
        Tangle::new(MemoryStore::new())
            .expect("engine")
            .with_seed(7)
            .with_clock(Box::new(FixedClock::new(1_000)))
    }

    #[test]
    fn add_then_duplicate() {
        let mut tangle = engine();
        let node = tangle.add_node(id("a")).expect("add");
        assert_eq!(node.weight, 0);
        assert_eq!(node.created_at, 1_000);
        assert!(matches!(
            tangle.add_node(id("a")),
            Err(TangleError::AlreadyExists(_))
        ));
    }

    #[test]
    fn approve_updates_parent_weights() {
        let mut tangle = engine();
        tangle.add_node(id("a")).expect("add");
        let approval = tangle.approve_node(id("b"), vec![id("a")]).expect("approve");
        assert!(approval.is_clean());

        let a = tangle.get_node(&id("a")).expect("a");
        assert_eq!(a.weight, 1);
        assert_eq!(a.cumulative_weight, 1);
    }

    #[test]
    fn validation_order() {
        let mut tangle = engine();
        tangle.add_node(id("a")).expect("add");

        assert!(matches!(
            tangle.approve_node(id("a"), vec![id("a")]),
            Err(TangleError::SelfReference(_))
        ));
        assert!(matches!(
            tangle.approve_node(id("b"), vec![id("ghost")]),
            Err(TangleError::ParentNotFound(_))
        ));
        assert!(matches!(
            tangle.approve_node(id("b"), vec![]),
            Err(TangleError::MissingParents(_))
        ));
    }

    #[test]
    fn closing_a_loop_reports_cycle() {
        let mut tangle = engine();
        tangle.add_node(id("a")).expect("add");
        tangle.approve_node(id("b"), vec![id("a")]).expect("b");
        tangle.approve_node(id("c"), vec![id("b")]).expect("c");

        let result = tangle.approve_node(id("a"), vec![id("c")]);
        assert!(matches!(
            result,
            Err(TangleError::CycleDetected { ref node, ref parent }) if node.as_str() == "a" && parent.as_str() == "c"
        ));
    }

    #[test]
    fn reapproving_without_loop_is_duplicate() {
        let mut tangle = engine();
        tangle.add_node(id("a")).expect("add");
        tangle.add_node(id("b")).expect("add");
        assert!(matches!(
            tangle.approve_node(id("a"), vec![id("b")]),
            Err(TangleError::AlreadyExists(_))
        ));
    }

    #[test]
    fn highest_weight_tie_goes_to_lowest_id() {
        let mut tangle = engine();
        tangle.add_node(id("b")).expect("add");
        tangle.add_node(id("a")).expect("add");
        assert_eq!(tangle.highest_weight_node().expect("highest").id, id("a"));
    }

    #[test]
    fn empty_graph_queries() {
        let mut tangle = engine();
        assert!(matches!(
            tangle.highest_weight_node(),
            Err(TangleError::EmptyGraph)
        ));
        assert!(matches!(
            tangle.select_tip(WalkParams::default()),
            Err(TangleError::NoNodes)
        ));
        assert!(matches!(
            tangle.latest_checkpoint(),
            Err(TangleError::CheckpointNotFound)
        ));
    }

    #[test]
    fn checkpoints_strictly_increase() {
        let mut tangle = engine();
        tangle.add_node(id("a")).expect("add");
        let first = tangle.create_checkpoint("one").expect("cp");
        let second = tangle.create_checkpoint("two").expect("cp");
        assert!(second.timestamp > first.timestamp);
        assert_eq!(tangle.latest_checkpoint().expect("latest").id, "two");
        assert!(matches!(
            tangle.create_checkpoint("one"),
            Err(TangleError::CheckpointExists(_))
        ));
    }

    #[test]
    fn stamp_resumes_from_stored_records() {
        let mut store = MemoryStore::new();
        store
            .put_node(&Node::new(id("old"), vec![], 5_000))
            .expect("put");
        let mut tangle = Tangle::new(store)
            .expect("engine")
            .with_clock(Box::new(FixedClock::new(10)));
        let node = tangle.add_node(id("new")).expect("add");
        assert_eq!(node.created_at, 5_000);
    }
}
