//! # Graph Engine: Adjacency
//!
//! Arena-style view of the approval graph, rebuilt from the full record set
//! for every aggregate operation.
//!
//! Records are numbered `0..len` in id order. `children[i]` holds the records
//! that approve record `i`; `parents[i]` holds the records `i` approves. Both
//! lists only reference records present in the set, in index order, without
//! duplicates. No back-references are kept, so the arena is dropped as a unit.

use crate::{Node, NodeId};
use bitvec::vec::BitVec;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Precomputed parent/child adjacency over a snapshot of records.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    ids: Vec<NodeId>,
    index: BTreeMap<NodeId, usize>,
    weights: Vec<u32>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
}

impl Adjacency {
    /// Build the adjacency from a record snapshot.
    ///
    /// Parent references to records outside the snapshot are ignored.
    #[must_use]
    pub fn build(nodes: &[Node]) -> Self {
        let mut sorted: Vec<&Node> = nodes.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted.dedup_by(|a, b| a.id == b.id);

        let ids: Vec<NodeId> = sorted.iter().map(|n| n.id.clone()).collect();
        let index: BTreeMap<NodeId, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let weights = sorted.iter().map(|n| n.weight).collect();

        let mut parents = vec![BTreeSet::new(); ids.len()];
        let mut children = vec![BTreeSet::new(); ids.len()];
        for (child, node) in sorted.iter().enumerate() {
            for parent in node.parents.iter().filter_map(|p| index.get(p)) {
                parents[child].insert(*parent);
                children[*parent].insert(child);
            }
        }

        Self {
            ids,
            index,
            weights,
            parents: parents.into_iter().map(|s| s.into_iter().collect()).collect(),
            children: children.into_iter().map(|s| s.into_iter().collect()).collect(),
        }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Arena index of a record.
    #[must_use]
    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Identifier at an arena index.
    #[must_use]
    pub fn id(&self, idx: usize) -> &NodeId {
        &self.ids[idx]
    }

    /// Direct weight at an arena index.
    #[must_use]
    pub fn weight(&self, idx: usize) -> u32 {
        self.weights[idx]
    }

    /// Records approving `idx`.
    #[must_use]
    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    /// Records approved by `idx`.
    #[must_use]
    pub fn parents(&self, idx: usize) -> &[usize] {
        &self.parents[idx]
    }

    /// Records that nothing approves yet, in id order.
    #[must_use]
    pub fn tips(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.children[i].is_empty())
            .collect()
    }

    /// Every record reachable from `idx` through child edges, excluding `idx`.
    #[must_use]
    pub fn descendants(&self, idx: usize) -> BTreeSet<usize> {
        self.reachable(idx, &self.children)
    }

    /// Every record reachable from `idx` through parent edges, excluding `idx`.
    #[must_use]
    pub fn ancestors(&self, idx: usize) -> BTreeSet<usize> {
        self.reachable(idx, &self.parents)
    }

    /// Union of the ancestors of every record in `starts`, plus the starts
    /// themselves.
    #[must_use]
    pub fn ancestor_closure(&self, starts: &[usize]) -> BTreeSet<usize> {
        let mut closure = BTreeSet::new();
        for &start in starts {
            if closure.insert(start) {
                closure.extend(self.ancestors(start));
            }
        }
        closure
    }

    /// True if `target` can be reached from `from` by following parent edges.
    #[must_use]
    pub fn reaches_upward(&self, from: usize, target: usize) -> bool {
        from == target || self.ancestors(from).contains(&target)
    }

    /// Cumulative weight of one record: own weight plus the weight of each
    /// distinct descendant.
    #[must_use]
    pub fn cumulative_weight(&self, idx: usize) -> i64 {
        self.descendants(idx)
            .into_iter()
            .fold(i64::from(self.weights[idx]), |acc, d| {
                acc.saturating_add(i64::from(self.weights[d]))
            })
    }

    /// Cumulative weights of all records, indexed like the arena.
    #[must_use]
    pub fn cumulative_weights(&self) -> Vec<i64> {
        let all: BTreeSet<usize> = (0..self.len()).collect();
        self.cumulative_weights_of(&all).into_values().collect()
    }

    /// Cumulative weights keyed by record id.
    #[must_use]
    pub fn cumulative_weight_map(&self) -> BTreeMap<NodeId, i64> {
        self.ids
            .iter()
            .cloned()
            .zip(self.cumulative_weights())
            .collect()
    }

    /// Cumulative weights of `targets` only, keyed by arena index.
    ///
    /// Only the cone of records at or below the targets is visited. Descendant
    /// sets are bitsets over that cone, built along a reverse topological
    /// order: a record hands its set to its last remaining parent instead of
    /// copying it, and a merge adds the weight of newly counted records only.
    /// Records on or below a cycle (a corrupted store) fall back to a direct
    /// traversal, which tolerates cycles.
    #[must_use]
    pub fn cumulative_weights_of(&self, targets: &BTreeSet<usize>) -> BTreeMap<usize, i64> {
        let cone = self.cone(targets);
        let consumers: Vec<usize> = (0..self.len())
            .map(|idx| match cone.slot[idx] {
                Some(_) => self.parents[idx]
                    .iter()
                    .filter(|&&p| cone.slot[p].is_some())
                    .count(),
                None => 0,
            })
            .collect();

        let mut remaining = consumers.clone();
        let mut memo: Vec<Option<Below>> = vec![None; self.len()];
        let mut weights = BTreeMap::new();

        for idx in self.cone_order(&cone, &consumers).into_iter().rev() {
            let below = self.collect_below(idx, &cone, &mut memo, &mut remaining);
            if targets.contains(&idx) {
                weights.insert(idx, i64::from(self.weights[idx]).saturating_add(below.total));
            }
            if consumers[idx] > 0 {
                memo[idx] = Some(below);
            }
        }

        for &idx in targets {
            weights
                .entry(idx)
                .or_insert_with(|| self.cumulative_weight(idx));
        }
        weights
    }

    /// The targets and every record below them.
    fn cone(&self, targets: &BTreeSet<usize>) -> Cone {
        let mut inside = vec![false; self.len()];
        let mut stack: Vec<usize> = targets.iter().copied().collect();
        while let Some(idx) = stack.pop() {
            if !inside[idx] {
                inside[idx] = true;
                stack.extend(self.children[idx].iter().copied());
            }
        }

        let members: Vec<usize> = (0..self.len()).filter(|&i| inside[i]).collect();
        let mut slot = vec![None; self.len()];
        for (local, &idx) in members.iter().enumerate() {
            slot[idx] = Some(local);
        }
        Cone { members, slot }
    }

    /// Kahn ordering of the cone with parents before children. Records on or
    /// below a cycle are left out.
    fn cone_order(&self, cone: &Cone, consumers: &[usize]) -> Vec<usize> {
        let mut pending = consumers.to_vec();
        let mut queue: VecDeque<usize> = cone
            .members
            .iter()
            .copied()
            .filter(|&i| pending[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(cone.members.len());

        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &child in &self.children[idx] {
                pending[child] = pending[child].saturating_sub(1);
                if pending[child] == 0 {
                    queue.push_back(child);
                }
            }
        }
        order
    }

    /// Descendant set of `idx`, assembled from its children's sets.
    ///
    /// A child's set is released once its last parent in the cone has read it.
    fn collect_below(
        &self,
        idx: usize,
        cone: &Cone,
        memo: &mut [Option<Below>],
        remaining: &mut [usize],
    ) -> Below {
        let mut acc: Option<Below> = None;

        for &child in &self.children[idx] {
            let Some(local) = cone.slot[child] else {
                continue;
            };
            remaining[child] = remaining[child].saturating_sub(1);
            let last_read = remaining[child] == 0;
            let child_weight = i64::from(self.weights[child]);

            match acc.as_mut() {
                None => {
                    let inherited = if last_read {
                        memo[child].take()
                    } else {
                        memo[child].clone()
                    };
                    let Some(mut below) = inherited else {
                        return self.direct_below(idx, cone);
                    };
                    below.insert(local, child_weight);
                    acc = Some(below);
                }
                Some(below) => {
                    let Some(child_below) = &memo[child] else {
                        return self.direct_below(idx, cone);
                    };
                    below.merge(child_below, |l| i64::from(self.weights[cone.members[l]]));
                    below.insert(local, child_weight);
                    if last_read {
                        memo[child] = None;
                    }
                }
            }
        }

        acc.unwrap_or_else(|| Below::empty(cone.members.len()))
    }

    fn direct_below(&self, idx: usize, cone: &Cone) -> Below {
        let mut below = Below::empty(cone.members.len());
        for d in self.descendants(idx) {
            if let Some(local) = cone.slot[d] {
                below.insert(local, i64::from(self.weights[d]));
            }
        }
        below
    }

    fn reachable(&self, start: usize, edges: &[Vec<usize>]) -> BTreeSet<usize> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<usize> = edges[start].clone();

        while let Some(current) = stack.pop() {
            if current == start || !visited.insert(current) {
                continue;
            }
            stack.extend(edges[current].iter().copied());
        }
        visited
    }
}

/// Records at or below a set of targets, with a dense local numbering.
struct Cone {
    /// Arena indices, ascending.
    members: Vec<usize>,
    /// Local slot of each arena index, `None` outside the cone.
    slot: Vec<Option<usize>>,
}

/// Descendants of one record, as a bitset over cone slots, with their summed
/// direct weight.
#[derive(Debug, Clone)]
struct Below {
    bits: BitVec,
    total: i64,
}

impl Below {
    fn empty(len: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, len),
            total: 0,
        }
    }

    fn insert(&mut self, local: usize, weight: i64) {
        if !self.bits[local] {
            self.bits.set(local, true);
            self.total = self.total.saturating_add(weight);
        }
    }

    /// Union with `other`, adding the weight of each slot not yet counted.
    fn merge(&mut self, other: &Self, weight_of: impl Fn(usize) -> i64) {
        let word_bits = usize::BITS as usize;
        let words = self
            .bits
            .as_raw_mut_slice()
            .iter_mut()
            .zip(other.bits.as_raw_slice());

        for (word, (dst, &src)) in words.enumerate() {
            let mut fresh = src & !*dst;
            *dst |= src;
            while fresh != 0 {
                let bit = fresh.trailing_zeros() as usize;
                self.total = self.total.saturating_add(weight_of(word * word_bits + bit));
                fresh &= fresh - 1;
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

    fn node(id: &str, parents: &[&str], weight: u32) -> Node {
        let mut n = Node::new(
            NodeId::new(id),
            parents.iter().map(|p| NodeId::new(*p)).collect(),
            0,
        );
        n.weight = weight;
        n
    }

    fn idx(adj: &Adjacency, id: &str) -> usize {
        adj.index_of(&NodeId::new(id)).expect("indexed")
    }

    /// a <- b <- c, with weights matching the approvals.
    fn chain() -> Adjacency {
        Adjacency::build(&[node("a", &[], 1), node("b", &["a"], 1), node("c", &["b"], 0)])
    }

    /// a <- b, a <- c, d approves both b and c.
    fn diamond() -> Adjacency {
        Adjacency::build(&[
            node("a", &[], 2),
            node("b", &["a"], 1),
            node("c", &["a"], 1),
            node("d", &["b", "c"], 0),
        ])
    }

    #[test]
    fn children_and_parents_are_inverse() {
        let adj = chain();
        let (a, b, c) = (idx(&adj, "a"), idx(&adj, "b"), idx(&adj, "c"));
        assert_eq!(adj.children(a), &[b]);
        assert_eq!(adj.parents(c), &[b]);
        assert!(adj.parents(a).is_empty());
    }

    #[test]
    fn tips_have_no_children() {
        let adj = diamond();
        let tips: Vec<&NodeId> = adj.tips().into_iter().map(|i| adj.id(i)).collect();
        assert_eq!(tips, vec![&NodeId::new("d")]);
    }

    #[test]
    fn chain_cumulative_weights() {
        let adj = chain();
        let map = adj.cumulative_weight_map();
        assert_eq!(map[&NodeId::new("a")], 2);
        assert_eq!(map[&NodeId::new("b")], 1);
        assert_eq!(map[&NodeId::new("c")], 0);
    }

    #[test]
    fn diamond_counts_shared_descendant_once() {
        let adj = diamond();
        let a = idx(&adj, "a");
        // own 2 + b 1 + c 1 + d 0
        assert_eq!(adj.cumulative_weight(a), 4);
        assert_eq!(adj.cumulative_weights()[a], 4);
    }

    #[test]
    fn memoized_matches_direct() {
        let adj = diamond();
        let memoized = adj.cumulative_weights();
        for i in 0..adj.len() {
            assert_eq!(memoized[i], adj.cumulative_weight(i));
        }
    }

    #[test]
    fn targeted_weights_match_full() {
        let adj = diamond();
        let full = adj.cumulative_weights();
        let targets: BTreeSet<usize> = [idx(&adj, "a"), idx(&adj, "c")].into_iter().collect();
        let some = adj.cumulative_weights_of(&targets);
        assert_eq!(some.len(), 2);
        for (i, w) in some {
            assert_eq!(w, full[i]);
        }
    }

    #[test]
    fn wide_fan_in_counts_each_record_once() {
        // More middle records than fit in one bitset word.
        let mut nodes = vec![node("root", &[], 100)];
        let middles: Vec<String> = (0..100).map(|i| format!("m{i:03}")).collect();
        for m in &middles {
            nodes.push(node(m, &["root"], 1));
        }
        let refs: Vec<&str> = middles.iter().map(String::as_str).collect();
        nodes.push(node("tip", &refs, 0));

        let adj = Adjacency::build(&nodes);
        let weights = adj.cumulative_weights();
        assert_eq!(weights[idx(&adj, "root")], 200);
        for i in 0..adj.len() {
            assert_eq!(weights[i], adj.cumulative_weight(i));
        }
    }

    #[test]
    fn long_chain_weights() {
        let n: usize = 5_000;
        let nodes: Vec<Node> = (0..n)
            .map(|i| {
                let id = format!("n{i:05}");
                let parent = format!("n{:05}", i.saturating_sub(1));
                let parents: Vec<&str> = if i == 0 { vec![] } else { vec![parent.as_str()] };
                node(&id, &parents, u32::from(i + 1 < n))
            })
            .collect();

        let adj = Adjacency::build(&nodes);
        let weights = adj.cumulative_weights();
        for (i, w) in weights.iter().enumerate() {
            assert_eq!(*w, i64::try_from(n - 1 - i).expect("fits"));
        }

        let head: BTreeSet<usize> = [n - 2].into_iter().collect();
        assert_eq!(adj.cumulative_weights_of(&head)[&(n - 2)], 1);
    }

    #[test]
    fn ancestor_closure_includes_starts() {
        let adj = diamond();
        let d = idx(&adj, "d");
        let closure = adj.ancestor_closure(adj.parents(d));
        let ids: Vec<&str> = closure.iter().map(|&i| adj.id(i).as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn reaches_upward_follows_parents_only() {
        let adj = chain();
        let (a, c) = (idx(&adj, "a"), idx(&adj, "c"));
        assert!(adj.reaches_upward(c, a));
        assert!(!adj.reaches_upward(a, c));
    }

    #[test]
    fn dangling_parents_ignored() {
        let adj = Adjacency::build(&[node("b", &["ghost"], 0)]);
        assert_eq!(adj.len(), 1);
        assert!(adj.parents(0).is_empty());
        assert_eq!(adj.tips(), vec![0]);
    }

    #[test]
    fn cycle_falls_back_to_traversal() {
        // Only a corrupted store can hold this shape.
        let adj = Adjacency::build(&[node("x", &["y"], 1), node("y", &["x"], 1)]);
        let weights = adj.cumulative_weights();
        assert_eq!(weights, vec![2, 2]);
        assert!(adj.tips().is_empty());
    }

    #[test]
    fn empty_snapshot() {
        let adj = Adjacency::build(&[]);
        assert!(adj.is_empty());
        assert!(adj.tips().is_empty());
        assert!(adj.cumulative_weights().is_empty());
    }
}
