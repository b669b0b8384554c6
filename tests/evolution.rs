//! End-to-end evolutionary loop tests spanning species, mutation,
//! selection, and the environment/evaluator boundary (spec §8, scenario 4).

use evolvatron::config::EvolutionConfig;
use evolvatron::evolver::Population;
use evolvatron::prelude::*;

/// A deterministic two-bit XOR task: one step per episode, reward is
/// `1 - (output - target)^2` so a perfect answer scores `1.0`.
struct XorEnvironment {
    pattern: [Scalar; 2],
    target: Scalar,
    done: bool,
}

impl XorEnvironment {
    fn new() -> Self {
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

fn xor_topology() -> Topology {
    Topology::new(
        vec![1, 2, 3, 1],
        vec![
            Activation::Linear.bit(),
            Activation::Linear.bit(),
            Activation::ALL.iter().fold(0, |acc, a| acc | a.bit()),
            Activation::Linear.bit() | Activation::Tanh.bit(),
        ],
        4,
        vec![
            (1, 3),
            (1, 4),
            (1, 5),
            (2, 3),
            (2, 4),
            (2, 5),
            (3, 6),
            (4, 6),
            (5, 6),
            (0, 6),
        ],
    )
    .unwrap()
}

/// Scenario 4 of spec §8: evolving against XOR should not regress the
/// best-ever fitness across generations, and the champion should end up
/// clearly better than a freshly-initialized population.
#[test]
fn xor_population_improves_over_generations() {
    let config = EvolutionConfig {
        species_count: 3,
        individuals_per_species: 24,
        elites: 2,
        tournament_size: 3,
        min_species_count: 2,
        ..EvolutionConfig::default()
    };
    let mut population = Population::initialize(&config, RunSeed(99), xor_topology);

    let initial_best = population
        .species
        .iter()
        .flat_map(|s| s.individuals.iter())
        .map(|i| i.fitness)
        .fold(f32::NEG_INFINITY, f32::max);

    for _ in 0..40 {
        population.step_generation(&config, 4, XorEnvironment::new);
    }

    let final_best = population
        .species
        .iter()
        .flat_map(|s| s.individuals.iter())
        .map(|i| i.fitness)
        .fold(f32::NEG_INFINITY, f32::max);

    assert!(
        final_best >= initial_best,
        "evolution should never regress the best observed fitness: {final_best} < {initial_best}"
    );
    assert!(final_best > 0.3, "expected noticeable progress on XOR after 40 generations, got {final_best}");
}

#[test]
fn population_never_drops_below_min_species_count() {
    let config = EvolutionConfig {
        species_count: 3,
        individuals_per_species: 8,
        min_species_count: 2,
        grace_generations: 0,
        stagnation_threshold: 1,
        ..EvolutionConfig::default()
    };
    let mut population = Population::initialize(&config, RunSeed(5), xor_topology);
    for _ in 0..10 {
        population.step_generation(&config, 1, XorEnvironment::new);
        assert!(population.species.len() >= config.min_species_count);
    }
}
