//! Typed error kinds surfaced at the crate boundary (spec §7).
//!
//! Guard-rail rejections from topology mutation (`EdgeExists`,
//! `WouldDisconnect`, `DegreeExceeded`, `WouldCycle`) are not propagated as
//! `Result` errors from the mutation operators themselves: per spec §7 they
//! are recovered locally by the mutator (the operator simply becomes a
//! no-op). They are still represented here so that `can_apply`-style
//! diagnostics and tests can name the specific rejection reason.

use thiserror::Error;

/// Errors surfaced to callers of the evolvatron core.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EvolvatronError {
    /// Species topology validation failed (spec §4.5, §4.17).
    #[error("invalid topology: {0}")]
    InvalidTopology(#[from] TopologyError),

    /// A constraint, joint, or geom referenced a particle/body index that
    /// does not exist in the world.
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// A configuration value is out of its admissible range (non-positive
    /// dt/iterations, negative masses, etc).
    #[error("incoherent config: {0}")]
    IncoherentConfig(String),

    /// All species were culled in the same generation without a replacement
    /// being produced. Fatal: the evolver cannot proceed with zero species.
    #[error("population is empty after culling")]
    PopulationEmpty,
}

/// Reasons a species topology fails validation (spec §4.5).
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TopologyError {
    #[error("row {0} has zero nodes")]
    EmptyRow(usize),

    #[error("bias row must contain exactly one node, found {0}")]
    BadBiasRow(usize),

    #[error("edge ({src}, {dst}) does not satisfy row(src) < row(dst)")]
    BackwardEdge { src: usize, dst: usize },

    #[error("node {node} exceeds max in-degree {max_in_degree}")]
    DegreeExceeded { node: usize, max_in_degree: usize },

    #[error("more than two parallel edges between ({src}, {dst})")]
    TooManyParallelEdges { src: usize, dst: usize },

    #[error("output row activation at node {node} is outside {{Linear, Tanh}}")]
    ForbiddenOutputActivation { node: usize },
}

/// Guard-rail outcome of a topology mutation attempt (spec §7). Not an
/// error in the `std::error::Error` sense: the caller treats a non-`Applied`
/// result as "the mutator did nothing" and continues.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MutationOutcome {
    Applied,
    EdgeExists,
    WouldDisconnect,
    DegreeExceeded,
    WouldCycle,
    NoCandidate,
}

impl MutationOutcome {
    #[must_use]
    pub fn applied(self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}
