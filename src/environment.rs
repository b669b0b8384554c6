//! The environment interface individuals are evaluated against, and the
//! rollout/aggregation driver that turns a controller into a fitness score
//! (spec §4.13, §6, component Q).

use crate::evaluator::forward::forward;
use crate::individual::Individual;
use crate::math::Scalar;
use crate::rng::{stream_rng, RunSeed, StreamKey};
use crate::species::topology::Topology;

/// A task an individual's controller is evaluated against. Implementations
/// own all task-specific state; `reset` must be fully determined by `seed`
/// so two calls with the same seed replay identically.
pub trait Environment {
    fn input_count(&self) -> usize;
    fn output_count(&self) -> usize;
    fn max_steps(&self) -> u32;
    fn reset(&mut self, seed: u64);
    fn observe(&self) -> Vec<Scalar>;
    /// Applies `actions` (the controller's output row) for one timestep and
    /// returns that step's scalar reward.
    fn step(&mut self, actions: &[Scalar]) -> Scalar;
    fn is_terminal(&self) -> bool;
}

/// Per-step reward substituted for the remainder of a rollout once a NaN is
/// observed, so a divergent controller is penalized rather than panicking
/// or silently scoring zero (spec §4.13, §7).
const NAN_DIVERGENCE_PENALTY: Scalar = -1.0e6;

const OPERATOR_TAG_ROLLOUT: u32 = 0;

/// Runs `rollouts` independent episodes of `individual` against `env`,
/// returning the per-rollout total reward for each.
pub fn run_rollouts(
    env: &mut impl Environment,
    topology: &Topology,
    individual: &Individual,
    run_seed: RunSeed,
    species_id: u32,
    individual_id: u32,
    generation: u32,
    rollouts: u32,
) -> Vec<Scalar> {
    let mut scratch = Vec::new();
    (0..rollouts)
        .map(|rollout| {
            let key = StreamKey::new(species_id, individual_id, generation, rollout, OPERATOR_TAG_ROLLOUT);
            let mut rollout_rng = stream_rng(run_seed, key);
            let seed: u64 = rand::Rng::gen(&mut rollout_rng);
            env.reset(seed);

            let mut total_reward: Scalar = 0.0;
            for _ in 0..env.max_steps() {
                let observations = env.observe();
                if observations.iter().any(|v| v.is_nan()) {
                    total_reward = NAN_DIVERGENCE_PENALTY;
                    break;
                }
                let actions = forward(topology, individual, &observations, &mut scratch);
                if actions.iter().any(|v| v.is_nan()) {
                    total_reward = NAN_DIVERGENCE_PENALTY;
                    break;
                }
                let reward = env.step(actions);
                if reward.is_nan() {
                    total_reward = NAN_DIVERGENCE_PENALTY;
                    break;
                }
                total_reward += reward;
                if env.is_terminal() {
                    break;
                }
            }
            total_reward
        })
        .collect()
}

/// Aggregates per-rollout totals into a single fitness score via CVaR@50%:
/// the mean of the worse half of the sorted rollout outcomes (spec §4.13).
/// This rewards controllers that perform consistently rather than ones that
/// occasionally get lucky.
#[must_use]
pub fn cvar_50(mut rollout_totals: Vec<Scalar>) -> Scalar {
    if rollout_totals.is_empty() {
        return Scalar::NEG_INFINITY;
    }
    rollout_totals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let half = (rollout_totals.len() + 1) / 2;
    rollout_totals[..half].iter().sum::<Scalar>() / half as Scalar
}

/// Evaluates one individual end-to-end: runs `rollouts` episodes and
/// aggregates them with [`cvar_50`], writing the result into
/// `individual.fitness`.
pub fn evaluate_individual(
    env: &mut impl Environment,
    topology: &Topology,
    individual: &mut Individual,
    run_seed: RunSeed,
    species_id: u32,
    individual_id: u32,
    generation: u32,
    rollouts: u32,
) {
    let totals = run_rollouts(env, topology, individual, run_seed, species_id, individual_id, generation, rollouts);
    individual.fitness = cvar_50(totals);
}

#[cfg(test)]
pub(crate) mod xor_fixture {
    use super::Environment;
    use crate::math::Scalar;

    /// A deterministic two-bit XOR task: one step per episode, reward is
    /// `1 - |output - target|^2` so a perfect answer scores `1.0`.
    pub struct XorEnvironment {
        pattern: [Scalar; 2],
        target: Scalar,
        done: bool,
    }

    impl XorEnvironment {
        pub fn new() -> Self {
            Self {
                pattern: [0.0, 0.0],
                target: 0.0,
                done: false,
            }
        }
    }

    impl Environment for XorEnvironment {
        fn input_count(&self) -> usize {
            2
        }
        fn output_count(&self) -> usize {
            1
        }
        fn max_steps(&self) -> u32 {
            1
        }
        fn reset(&mut self, seed: u64) {
            let patterns = [([0.0, 0.0], 0.0), ([0.0, 1.0], 1.0), ([1.0, 0.0], 1.0), ([1.0, 1.0], 0.0)];
            let (pattern, target) = patterns[(seed as usize) % patterns.len()];
            self.pattern = pattern;
            self.target = target;
            self.done = false;
        }
        fn observe(&self) -> Vec<Scalar> {
            self.pattern.to_vec()
        }
        fn step(&mut self, actions: &[Scalar]) -> Scalar {
            self.done = true;
            let error = actions[0] - self.target;
            1.0 - error * error
        }
        fn is_terminal(&self) -> bool {
            self.done
        }
    }
}
