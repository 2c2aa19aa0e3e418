//! # Engine Primitives
//!
//! Hardcoded runtime constants for the tangle engine.
//!
//! These are compiled into the binary and are immutable at runtime. Walk
//! defaults can be overridden per call through [`crate::WalkParams`].

/// Default bias strength of the MCMC acceptance rule.
pub const DEFAULT_ALPHA: f64 = 0.01;

/// Default number of walk steps.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Upper bound accepted for `max_steps`.
///
/// All walks must be computationally bounded.
pub const MAX_WALK_STEPS: usize = 1_000_000;

/// Every this many steps the walk re-descends from a parent of the current
/// candidate instead of proposing a new tip.
pub const PERTURBATION_INTERVAL: usize = 100;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for record and checkpoint identifiers, in bytes.
pub const MAX_NODE_ID_LENGTH: usize = 256;

/// Maximum number of parents a single approval may declare.
pub const MAX_PARENTS: usize = 64;

/// Format tag mixed into checkpoint fingerprints.
///
/// Increment the trailing version when the fingerprint input changes.
pub const FINGERPRINT_DOMAIN: &[u8] = b"tangle-checkpoint-v1";

/// Share of valid nodes that counts as fully consistent, in millionths.
pub const FULL_CONSISTENCY_MILLIONTHS: u64 = 1_000_000;
