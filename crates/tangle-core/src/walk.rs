//! # Tip Selection Walk
//!
//! Markov-chain random walk over the current tips, biased towards tips with
//! a higher cumulative weight.
//!
//! Each step proposes a uniformly random tip and accepts it with probability
//! `min(1, exp(alpha * (cw(proposed) - cw(current))))`. Every
//! `PERTURBATION_INTERVAL` steps the walk instead climbs to a random parent of
//! the current candidate and descends through random children to a tip,
//! which lets it leave a local optimum.
//!
//! This is the only module of the engine that uses floating point.

#![allow(clippy::float_arithmetic)]

use crate::graph::Adjacency;
use crate::primitives::{DEFAULT_ALPHA, DEFAULT_MAX_STEPS, MAX_WALK_STEPS, PERTURBATION_INTERVAL};
use crate::TangleError;
use rand::Rng;

/// Parameters of one tip-selection walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParams {
    /// Bias strength. `0.0` gives a uniform walk over the tips.
    pub alpha: f64,
    /// Number of steps to run.
    pub max_steps: usize,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl WalkParams {
    /// Create walk parameters.
    #[must_use]
    pub const fn new(alpha: f64, max_steps: usize) -> Self {
        Self { alpha, max_steps }
    }

    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), TangleError> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(TangleError::InvalidWalkParams(format!(
                "alpha must be finite and non-negative, got {}",
                self.alpha
            )));
        }
        if self.max_steps == 0 || self.max_steps > MAX_WALK_STEPS {
            return Err(TangleError::InvalidWalkParams(format!(
                "max_steps must be in 1..={}, got {}",
                MAX_WALK_STEPS, self.max_steps
            )));
        }
        Ok(())
    }
}

/// Summary of a finished walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WalkOutcome {
    /// Arena index of the selected record.
    pub tip: usize,
    /// Proposals accepted by the Metropolis rule.
    pub accepted: usize,
    /// Parent-descent perturbations performed.
    pub perturbations: usize,
}

/// Run the walk over `adj`.
///
/// The caller guarantees `params` are validated.
pub(crate) fn run<R: Rng>(
    adj: &Adjacency,
    params: &WalkParams,
    rng: &mut R,
) -> Result<WalkOutcome, TangleError> {
    let (candidates, weights) = walk_candidates(adj);
    if candidates.is_empty() {
        return Err(TangleError::NoNodes);
    }

    let mut current = candidates[rng.gen_range(0..candidates.len())];
    let mut accepted = 0;
    let mut perturbations = 0;

    for step in 1..=params.max_steps {
        if step % PERTURBATION_INTERVAL == 0 {
            let parents = adj.parents(current);
            if parents.is_empty() {
                continue;
            }
            let start = parents[rng.gen_range(0..parents.len())];
            current = descend(adj, start, rng)?;
            perturbations += 1;
            continue;
        }

        let proposed = candidates[rng.gen_range(0..candidates.len())];
        let delta = weights[proposed].saturating_sub(weights[current]) as f64;
        let probability = (params.alpha * delta).exp().min(1.0);
        if rng.r#gen::<f64>() < probability {
            current = proposed;
            accepted += 1;
        }
    }

    Ok(WalkOutcome {
        tip: current,
        accepted,
        perturbations,
    })
}

/// Walk candidates and their cumulative weights, indexed like the arena.
///
/// A tip has no descendants, so its cumulative weight is its own weight.
/// Only a graph without tips (a corrupted, cyclic store) walks over every
/// record and needs the full computation.
fn walk_candidates(adj: &Adjacency) -> (Vec<usize>, Vec<i64>) {
    let tips = adj.tips();
    if tips.is_empty() {
        return ((0..adj.len()).collect(), adj.cumulative_weights());
    }

    let mut weights = vec![0; adj.len()];
    for &tip in &tips {
        weights[tip] = i64::from(adj.weight(tip));
    }
    (tips, weights)
}

/// Follow random child edges from `start` until reaching a record with no
/// children. More hops than records means the walk is going round a cycle.
fn descend<R: Rng>(adj: &Adjacency, start: usize, rng: &mut R) -> Result<usize, TangleError> {
    let mut current = start;
    for _ in 0..=adj.len() {
        let children = adj.children(current);
        if children.is_empty() {
            return Ok(current);
        }
        current = children[rng.gen_range(0..children.len())];
    }
    Err(TangleError::WalkStepLimitExceeded(adj.len()))
}

// =============================================================================
// TESTS
// =============================================================================
