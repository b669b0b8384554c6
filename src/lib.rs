//! `evolvatron`: a deterministic 2D XPBD/impulse physics sandbox coupled
//! with a population-based neuroevolution loop for training controllers
//! against it.
//!
//! The crate has two halves that only meet at [`environment::Environment`]:
//!
//! - **Physics** ([`world`], [`integrator`], [`solver`], [`math`]): particle
//!   XPBD constraints and rigid-body sequential-impulse contacts/joints
//!   advanced by a fixed-timestep substepper.
//! - **Neuroevolution** ([`species`], [`individual`], [`evaluator`],
//!   [`mutation`], [`pruning`], [`selection`], [`evolver`]): row-synchronous
//!   feed-forward controllers evolved by a generational, species-based
//!   algorithm with deterministic, counter-based RNG ([`rng`]).
//!
//! Every stochastic operation in the neuroevolution half is seeded from a
//! [`rng::StreamKey`] so that two runs with the same [`rng::RunSeed`]
//! produce bit-identical populations (spec §4.16, §5).

pub mod activation;
pub mod config;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod evolver;
pub mod individual;
pub mod integrator;
pub mod math;
pub mod mutation;
pub mod pruning;
pub mod rng;
pub mod selection;
pub mod solver;
pub mod species;
pub mod world;

/// Commonly used types, re-exported for `use evolvatron::prelude::*;`.
pub mod prelude {
    pub use crate::activation::Activation;
    pub use crate::config::{EvolutionConfig, MutationRates, PhysicsConfig, TopologyRates, WeakEdgePruning};
    pub use crate::environment::Environment;
    pub use crate::error::{EvolvatronError, MutationOutcome, TopologyError};
    pub use crate::evolver::{Population, Species};
    pub use crate::individual::Individual;
    pub use crate::math::{Scalar, StaticCollider, Vector};
    pub use crate::rng::{RunSeed, StreamKey};
    pub use crate::species::topology::Topology;
    pub use crate::world::World;
}
