//! # tangle-core
//!
//! The graph engine for the approval tangle - THE LOGIC.
//!
//! An append-only DAG of approval records. Each new record approves one or
//! more existing records; the engine derives per-record approval weight,
//! cumulative weight over all descendants, and a weighted random choice of a
//! frontier record (tip) through a Markov-chain walk.
//!
//! ## Architectural Constraints
//!
//! - A single owner (`Tangle`) performs every mutation
//! - Has NO async, NO network dependencies (pure Rust)
//! - `BTreeMap`/`BTreeSet` only, so every scan runs in id order
//! - Floating point only inside the walk acceptance rule

// =============================================================================
// MODULES
// =============================================================================

pub mod checkpoint;
pub mod clock;
pub mod consistency;
pub mod graph;
pub mod primitives;
pub mod repository;
pub mod storage;
pub mod tangle;
pub mod types;
pub mod validation;
pub mod walk;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Approval, Checkpoint, ErrorKind, Node, NodeId, PropagationWarning, TangleError,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use checkpoint::fingerprint;
pub use clock::{Clock, FixedClock, MonotonicStamp, SystemClock};
pub use consistency::{ConsistencyReport, ConsistencyStatus, Mismatch};
pub use graph::Adjacency;
pub use repository::NodeRepository;
pub use storage::{MemoryStore, RedbStore, StorageBackend};
pub use tangle::Tangle;
pub use walk::WalkParams;
