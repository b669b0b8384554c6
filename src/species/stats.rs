//! Rolling per-species fitness history and culling eligibility (spec §4.11,
//! component N).

use crate::config::EvolutionConfig;
use crate::individual::Individual;
use crate::math::Scalar;

const HISTORY_LEN: usize = 10;

/// A species' rolling fitness record: a length-`HISTORY_LEN` ring of median
/// fitness per generation, plus the best fitness ever observed and how long
/// it has been since an improvement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeciesStats {
    history: Vec<Scalar>,
    pub best_ever: Scalar,
    pub gens_since_improvement: u32,
    pub birth_generation: u32,
}

impl SpeciesStats {
    #[must_use]
    pub fn new(birth_generation: u32) -> Self {
        Self {
            history: Vec::new(),
            best_ever: Scalar::NEG_INFINITY,
            gens_since_improvement: 0,
            birth_generation,
        }
    }

    /// Records one generation's median fitness, updating `best_ever` and the
    /// stagnation counter. Pushes onto a ring capped at `HISTORY_LEN`
    /// entries (oldest dropped first).
    pub fn record(&mut self, median_fitness: Scalar) {
        if self.history.len() == HISTORY_LEN {
            self.history.remove(0);
        }
        self.history.push(median_fitness);

        if median_fitness > self.best_ever {
            self.best_ever = median_fitness;
            self.gens_since_improvement = 0;
        } else {
            self.gens_since_improvement += 1;
        }
    }

    #[must_use]
    pub fn history(&self) -> &[Scalar] {
        &self.history
    }

    /// Variance of the recorded history (population variance, biased), or
    /// `0.0` with fewer than two samples.
    #[must_use]
    pub fn variance(&self) -> Scalar {
        if self.history.len() < 2 {
            return 0.0;
        }
        let mean = self.history.iter().sum::<Scalar>() / self.history.len() as Scalar;
        self.history.iter().map(|v| (v - mean).powi(2)).sum::<Scalar>() / self.history.len() as Scalar
    }

    /// Is this species old enough (by generations since birth) to be culled
    /// at all, per `config.grace_generations`?
    #[must_use]
    pub fn past_grace_period(&self, current_generation: u32, config: &EvolutionConfig) -> bool {
        current_generation.saturating_sub(self.birth_generation) >= config.grace_generations
    }

    #[must_use]
    pub fn is_stagnant(&self, config: &EvolutionConfig) -> bool {
        self.gens_since_improvement >= config.stagnation_threshold
    }

    #[must_use]
    pub fn is_low_diversity(&self, config: &EvolutionConfig) -> bool {
        self.history.len() >= HISTORY_LEN && self.variance() < config.species_diversity_threshold
    }
}

/// Median fitness of a generation's individuals (even-length sets average
/// the two central values).
#[must_use]
pub fn median_fitness(individuals: &[Individual]) -> Scalar {
    if individuals.is_empty() {
        return Scalar::NEG_INFINITY;
    }
    let mut values: Vec<Scalar> = individuals.iter().map(|i| i.fitness).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Is `candidate_median` eligible for relative-performance culling against
/// the best species' median (spec §4.11: "falls below `threshold *
/// best_median`")?
#[must_use]
pub fn is_relatively_weak(candidate_median: Scalar, best_median: Scalar, config: &EvolutionConfig) -> bool {
    if best_median <= 0.0 {
        return false;
    }
    candidate_median < config.relative_performance_threshold * best_median
}

#[cfg(test)]
mod tests {
    use super::*;

    fn individual_with_fitness(fitness: Scalar) -> Individual {
        Individual {
            weights: Vec::new(),
            biases: Vec::new(),
            activations: Vec::new(),
            node_params: Vec::new(),
            fitness,
            age: 0,
        }
    }

    #[test]
    fn median_of_odd_set() {
        let individuals = vec![
            individual_with_fitness(1.0),
            individual_with_fitness(5.0),
            individual_with_fitness(3.0),
        ];
        assert_eq!(median_fitness(&individuals), 3.0);
    }

    #[test]
    fn stagnation_flags_after_threshold_generations_flat() {
        let config = EvolutionConfig::default();
        let mut stats = SpeciesStats::new(0);
        for _ in 0..config.stagnation_threshold {
            stats.record(1.0);
        }
        assert!(stats.is_stagnant(&config));
    }

    #[test]
    fn improvement_resets_stagnation_counter() {
        let config = EvolutionConfig::default();
        let mut stats = SpeciesStats::new(0);
        for _ in 0..5 {
            stats.record(1.0);
        }
        stats.record(2.0);
        assert_eq!(stats.gens_since_improvement, 0);
        assert!(!stats.is_stagnant(&config));
    }

    #[test]
    fn grace_period_blocks_early_culling() {
        let config = EvolutionConfig::default();
        let stats = SpeciesStats::new(10);
        assert!(!stats.past_grace_period(11, &config));
        assert!(stats.past_grace_period(10 + config.grace_generations, &config));
    }
}
