//! Configuration structs for the physics core and the evolutionary loop
//! (spec §6). Every field documents its default and admissible range,
//! following the teacher's `SolverConfig` convention.

use crate::math::Scalar;

/// Physics tuning parameters consumed by [`crate::solver::step`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PhysicsConfig {
    /// Frame timestep, seconds. Must be positive. Default: `1.0 / 60.0`.
    pub dt: Scalar,
    /// Number of substeps per `step` call. Must be >= 1. Default: `4`.
    pub substeps: u32,
    /// XPBD/impulse solver iterations per substep. Must be >= 1. Default: `4`.
    pub xpbd_iterations: u32,
    /// Gravity vector X component. Default: `0.0`.
    pub gravity_x: Scalar,
    /// Gravity vector Y component. Default: `-9.81`.
    pub gravity_y: Scalar,
    /// Global fallback compliance for particle-collider contacts when a
    /// per-contact value is unspecified. Default: `0.0` (rigid).
    pub contact_compliance: Scalar,
    /// Global fallback compliance for rods when a rod's own compliance is
    /// `0.0`. Default: `0.0` (rigid).
    pub rod_compliance: Scalar,
    /// Global fallback compliance for angle constraints. Default: `0.0001`.
    pub angle_compliance: Scalar,
    /// Global fallback compliance for motor constraints. Default: `0.0001`.
    pub motor_compliance: Scalar,
    /// Coulomb friction coefficient `mu`, used by both the particle friction
    /// pass and the rigid-body contact solver. Range `[0, inf)`. Default: `0.5`.
    pub friction_mu: Scalar,
    /// Restitution coefficient `e` for rigid-body contacts. Range `[0, 1]`.
    /// Default: `0.0`.
    pub restitution: Scalar,
    /// Blend factor `beta` for velocity stabilization (spec §4.1 step 9).
    /// Range `[0, 1]`. Default: `1.0`.
    pub velocity_stabilization_beta: Scalar,
    /// Global linear damping coefficient, per-second. Default: `0.0`.
    pub global_damping: Scalar,
    /// Global angular damping coefficient, per-second. Default: `0.0`.
    pub angular_damping: Scalar,
    /// Hard velocity clamp applied after stabilization. Default: `50.0`.
    pub max_velocity: Scalar,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            substeps: 4,
            xpbd_iterations: 4,
            gravity_x: 0.0,
            gravity_y: -9.81,
            contact_compliance: 0.0,
            rod_compliance: 0.0,
            angle_compliance: 0.0001,
            motor_compliance: 0.0001,
            friction_mu: 0.5,
            restitution: 0.0,
            velocity_stabilization_beta: 1.0,
            global_damping: 0.0,
            angular_damping: 0.0,
            max_velocity: 50.0,
        }
    }
}

impl PhysicsConfig {
    /// Validates non-positive dt/iterations etc (spec §7 `IncoherentConfig`).
    pub fn validate(&self) -> Result<(), crate::error::EvolvatronError> {
        use crate::error::EvolvatronError;
        if self.dt <= 0.0 {
            return Err(EvolvatronError::IncoherentConfig("dt must be positive".into()));
        }
        if self.substeps == 0 {
            return Err(EvolvatronError::IncoherentConfig(
                "substeps must be >= 1".into(),
            ));
        }
        if self.xpbd_iterations == 0 {
            return Err(EvolvatronError::IncoherentConfig(
                "xpbd_iterations must be >= 1".into(),
            ));
        }
        if self.friction_mu < 0.0 {
            return Err(EvolvatronError::IncoherentConfig(
                "friction_mu must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(EvolvatronError::IncoherentConfig(
                "restitution must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }

    /// The fixed per-substep timestep, `dt / substeps`.
    #[must_use]
    pub fn substep_dt(&self) -> Scalar {
        self.dt / self.substeps as Scalar
    }
}

/// Mutation probabilities applied per-individual per-generation (spec §4.7).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MutationRates {
    /// Per-weight jitter probability. Default: `0.8`.
    pub p_jitter: Scalar,
    /// Jitter standard deviation scale (`sigma = jitter_stddev * |w|`).
    /// Default: `0.1`.
    pub jitter_stddev: Scalar,
    /// Minimum jitter sigma floor so near-zero weights still move. Default: `0.01`.
    pub jitter_stddev_floor: Scalar,
    /// Probability of resetting one random weight. Default: `0.05`.
    pub p_reset: Scalar,
    /// Probability of L1-shrinking all weights. Default: `0.02`.
    pub p_shrink: Scalar,
    /// Shrink factor applied when `p_shrink` fires. Default: `0.9`.
    pub shrink_factor: Scalar,
    /// Probability of swapping one node's activation. Default: `0.05`.
    pub p_act: Scalar,
    /// Probability of jittering node params. Default: `0.05`.
    pub p_params: Scalar,
    /// Node-param jitter standard deviation. Default: `0.1`.
    pub params_stddev: Scalar,
}

impl Default for MutationRates {
    fn default() -> Self {
        Self {
            p_jitter: 0.8,
            jitter_stddev: 0.1,
            jitter_stddev_floor: 0.01,
            p_reset: 0.05,
            p_shrink: 0.02,
            shrink_factor: 0.9,
            p_act: 0.05,
            p_params: 0.05,
            params_stddev: 0.1,
        }
    }
}

/// Probabilities for topology-editing mutation operators (spec §4.7).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TopologyRates {
    pub p_edge_add: Scalar,
    pub p_edge_delete: Scalar,
    pub p_edge_split: Scalar,
    pub p_edge_redirect: Scalar,
    pub p_edge_duplicate: Scalar,
    pub p_edge_merge: Scalar,
    pub p_edge_swap: Scalar,
}

impl Default for TopologyRates {
    fn default() -> Self {
        Self {
            p_edge_add: 0.02,
            p_edge_delete: 0.02,
            p_edge_split: 0.01,
            p_edge_redirect: 0.01,
            p_edge_duplicate: 0.005,
            p_edge_merge: 0.005,
            p_edge_swap: 0.01,
        }
    }
}

/// Weak-edge pruning configuration (spec §4.9).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WeakEdgePruning {
    /// Enables pruning at species birth (diversification).
    pub at_birth: bool,
    /// Enables pruning during ordinary generational evolution.
    pub during_evolution: bool,
    /// Mean-absolute-weight threshold below which an edge is a pruning
    /// candidate. Default: `0.05`.
    pub threshold: Scalar,
    /// Base deletion probability at `mean_abs == 0`. Default: `0.1`.
    pub base_rate: Scalar,
}

impl Default for WeakEdgePruning {
    fn default() -> Self {
        Self {
            at_birth: true,
            during_evolution: false,
            threshold: 0.05,
            base_rate: 0.1,
        }
    }
}

/// Evolutionary-loop configuration consumed by [`crate::evolver::step_generation`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EvolutionConfig {
    /// Number of species maintained in the population. Default: `4`.
    pub species_count: usize,
    /// Individuals per species. Default: `64`.
    pub individuals_per_species: usize,
    /// Culling never reduces the population below this many species. Default: `2`.
    pub min_species_count: usize,
    /// Elites copied unchanged per species per generation. Default: `2`.
    pub elites: usize,
    /// Tournament size for parent selection. Clamped to population size. Default: `4`.
    pub tournament_size: usize,
    /// Fraction (0, 1] of ranked individuals eligible as parents. Default: `0.5`.
    pub parent_pool_percentage: Scalar,
    /// Generations a species is protected from culling after birth. Default: `5`.
    pub grace_generations: u32,
    /// Generations without improvement before a species is stagnation-eligible.
    /// Default: `15`.
    pub stagnation_threshold: u32,
    /// Fitness-variance floor below which a species is culling-eligible.
    /// Default: `0.01`.
    pub species_diversity_threshold: Scalar,
    /// Median fitness must fall below `threshold * best_species_median` to be
    /// culling-eligible. Default: `0.5`.
    pub relative_performance_threshold: Scalar,
    pub mutation_rates: MutationRates,
    pub topology_rates: TopologyRates,
    pub weak_edge_pruning: WeakEdgePruning,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            species_count: 4,
            individuals_per_species: 64,
            min_species_count: 2,
            elites: 2,
            tournament_size: 4,
            parent_pool_percentage: 0.5,
            grace_generations: 5,
            stagnation_threshold: 15,
            species_diversity_threshold: 0.01,
            relative_performance_threshold: 0.5,
            mutation_rates: MutationRates::default(),
            topology_rates: TopologyRates::default(),
            weak_edge_pruning: WeakEdgePruning::default(),
        }
    }
}
