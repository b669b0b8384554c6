//! The generational driver: evaluate, update stats, cull and diversify,
//! then produce the next generation per species (spec §4.14, §5,
//! component P).

use rayon::prelude::*;

use crate::config::EvolutionConfig;
use crate::environment::{evaluate_individual, Environment};
use crate::individual::Individual;
use crate::math::Scalar;
use crate::mutation::{mutate_individual, mutate_topology};
use crate::pruning::prune_weak_edges;
use crate::rng::{stream_rng, RunSeed, StreamKey};
use crate::selection::{parent_pool, rank_by_fitness, tournament_select};
use crate::species::diversify::diversify;
use crate::species::stats::{is_relatively_weak, median_fitness, SpeciesStats};
use crate::species::topology::Topology;

const OPERATOR_TAG_INIT: u32 = 100;
const OPERATOR_TAG_MUTATION: u32 = 101;
const OPERATOR_TAG_DIVERSIFY: u32 = 102;
const OPERATOR_TAG_TOPOLOGY: u32 = 103;
const OPERATOR_TAG_PRUNING: u32 = 104;

/// One species: a shared topology and the individuals evolving over it
/// (spec §3).
#[derive(Debug, Clone)]
pub struct Species {
    pub id: u32,
    pub topology: Topology,
    pub individuals: Vec<Individual>,
    pub stats: SpeciesStats,
}

/// The full evolving population (spec §3).
#[derive(Debug, Clone)]
pub struct Population {
    pub species: Vec<Species>,
    pub generation: u32,
    pub run_seed: RunSeed,
    next_species_id: u32,
}

impl Population {
    /// Builds an initial population: `config.species_count` species, each
    /// with its own topology from `make_topology` and
    /// `config.individuals_per_species` randomly-initialized individuals
    /// (spec §4.14).
    pub fn initialize(config: &EvolutionConfig, run_seed: RunSeed, make_topology: impl Fn() -> Topology) -> Self {
        let species = (0..config.species_count)
            .map(|species_idx| {
                let species_id = species_idx as u32;
                let topology = make_topology();
                let mut rng = stream_rng(run_seed, StreamKey::new(species_id, 0, 0, 0, OPERATOR_TAG_INIT));
                let individuals = (0..config.individuals_per_species)
                    .map(|_| Individual::random(&topology, &mut rng))
                    .collect();
                Species {
                    id: species_id,
                    topology,
                    individuals,
                    stats: SpeciesStats::new(0),
                }
            })
            .collect();

        Self {
            species,
            generation: 0,
            run_seed,
            next_species_id: config.species_count as u32,
        }
    }

    /// Evaluates every individual against a fresh `E` (environments carry
    /// per-episode mutable state, so each evaluation gets its own instance
    /// via `make_env`), updates per-species stats, culls and replaces weak
    /// species, then advances every surviving species to its next
    /// generation (spec §4.14, §5).
    ///
    /// Evaluation runs one Rayon task per individual; no individual ever
    /// shares RNG state or environment state with another (spec §5).
    pub fn step_generation<E: Environment + Send>(&mut self, config: &EvolutionConfig, rollouts: u32, make_env: impl Fn() -> E + Sync) {
        self.evaluate(config, rollouts, make_env);
        self.update_stats();
        self.cull_and_diversify(config);
        self.advance_generation(config);
        self.generation += 1;
    }

    fn evaluate<E: Environment + Send>(&mut self, _config: &EvolutionConfig, rollouts: u32, make_env: impl Fn() -> E + Sync) {
        let run_seed = self.run_seed;
        let generation = self.generation;
        for species in &mut self.species {
            let topology = &species.topology;
            let species_id = species.id;
            species
                .individuals
                .par_iter_mut()
                .enumerate()
                .for_each(|(individual_id, individual)| {
                    let mut env = make_env();
                    evaluate_individual(
                        &mut env,
                        topology,
                        individual,
                        run_seed,
                        species_id,
                        individual_id as u32,
                        generation,
                        rollouts,
                    );
                });
        }
    }

    fn update_stats(&mut self) {
        for species in &mut self.species {
            let median = median_fitness(&species.individuals);
            species.stats.record(median);
        }
    }

    fn cull_and_diversify(&mut self, config: &EvolutionConfig) {
        if self.species.len() <= config.min_species_count {
            return;
        }

        let best_median = self
            .species
            .iter()
            .map(|s| median_fitness(&s.individuals))
            .fold(Scalar::NEG_INFINITY, Scalar::max);

        // Rank species worst-first so, if more are eligible than we can
        // afford to cull, the weakest ones go first.
        let mut eligibility: Vec<(usize, Scalar)> = self
            .species
            .iter()
            .enumerate()
            .filter_map(|(idx, species)| {
                let median = median_fitness(&species.individuals);
                let eligible = species.stats.past_grace_period(self.generation, config)
                    && species.stats.is_stagnant(config)
                    && species.stats.is_low_diversity(config)
                    && is_relatively_weak(median, best_median, config);
                eligible.then_some((idx, median))
            })
            .collect();
        eligibility.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let max_cullable = self.species.len().saturating_sub(config.min_species_count);
        let cull_indices: std::collections::HashSet<usize> =
            eligibility.into_iter().take(max_cullable).map(|(idx, _)| idx).collect();

        if cull_indices.is_empty() {
            return;
        }

        let mut survivors = Vec::with_capacity(self.species.len() - cull_indices.len());
        let mut culled = Vec::with_capacity(cull_indices.len());
        for (idx, species) in self.species.drain(..).enumerate() {
            if cull_indices.contains(&idx) {
                culled.push(species);
            } else {
                survivors.push(species);
            }
        }
        self.species = survivors;

        let mut ranked_species: Vec<&Species> = self.species.iter().collect();
        ranked_species.sort_by(|a, b| {
            median_fitness(&b.individuals)
                .partial_cmp(&median_fitness(&a.individuals))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let source_count = ranked_species.len().min(2).max(1);
        let sources: Vec<(Topology, Vec<Individual>)> = ranked_species[..source_count.min(ranked_species.len())]
            .iter()
            .map(|s| (s.topology.clone(), s.individuals.clone()))
            .collect();

        if sources.is_empty() {
            return;
        }

        for (offset, _) in culled.into_iter().enumerate() {
            let (source_topology, source_individuals) = &sources[offset % sources.len()];
            let species_id = self.next_species_id;
            self.next_species_id += 1;
            let mut rng = stream_rng(self.run_seed, StreamKey::new(species_id, 0, self.generation, 0, OPERATOR_TAG_DIVERSIFY));
            let (mut new_topology, mut new_individuals) = diversify(source_topology, source_individuals, &mut rng);
            for individual in &mut new_individuals {
                individual.age = 0;
                individual.fitness = 0.0;
            }
            if config.weak_edge_pruning.at_birth {
                prune_weak_edges(&mut new_topology, &mut new_individuals, &config.weak_edge_pruning, &mut rng);
            }
            self.species.push(Species {
                id: species_id,
                topology: new_topology,
                individuals: new_individuals,
                stats: SpeciesStats::new(self.generation),
            });
        }
    }

    fn advance_generation(&mut self, config: &EvolutionConfig) {
        let generation = self.generation;
        let run_seed = self.run_seed;
        for species in &mut self.species {
            let ranked = rank_by_fitness(&species.individuals);
            let elite_count = config.elites.min(species.individuals.len());
            let mut next_generation: Vec<Individual> = ranked[..elite_count]
                .iter()
                .map(|&idx| species.individuals[idx].clone())
                .collect();

            let pool = parent_pool(&ranked, config.parent_pool_percentage);
            let species_id = species.id;
            while next_generation.len() < species.individuals.len() {
                let offspring_idx = next_generation.len() as u32;
                let mut rng = stream_rng(run_seed, StreamKey::new(species_id, offspring_idx, generation, 0, OPERATOR_TAG_MUTATION));
                let parent_idx = tournament_select(&species.individuals, pool, config.tournament_size, &mut rng);
                let mut offspring = species.individuals[parent_idx].clone();
                offspring.age = 0;
                offspring.fitness = 0.0;
                mutate_individual(&mut offspring, &species.topology, &config.mutation_rates, &mut rng);
                next_generation.push(offspring);
            }

            for individual in &mut next_generation[elite_count..] {
                individual.age = 0;
            }
            for individual in &mut next_generation[..elite_count] {
                individual.age += 1;
            }
            species.individuals = next_generation;

            let mut topology_rng = stream_rng(run_seed, StreamKey::new(species_id, 0, generation, 0, OPERATOR_TAG_TOPOLOGY));
            mutate_topology(&mut species.topology, &mut species.individuals, &config.topology_rates, &mut topology_rng);
            if config.weak_edge_pruning.during_evolution {
                let mut pruning_rng = stream_rng(run_seed, StreamKey::new(species_id, 0, generation, 0, OPERATOR_TAG_PRUNING));
                prune_weak_edges(&mut species.topology, &mut species.individuals, &config.weak_edge_pruning, &mut pruning_rng);
            }
        }
    }
}
