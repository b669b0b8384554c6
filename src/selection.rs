//! Parent selection: tournaments over a ranked pool, with elitism carried
//! separately by the caller (spec §4.10, component M).

use rand::Rng;

use crate::individual::Individual;

/// Indices into `individuals`, ordered best-fitness-first. Ties keep their
/// relative input order (a stable sort).
#[must_use]
pub fn rank_by_fitness(individuals: &[Individual]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..individuals.len()).collect();
    order.sort_by(|&a, &b| {
        individuals[b]
            .fitness
            .partial_cmp(&individuals[a].fitness)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// The best `parent_pool_percentage` fraction of `ranked` (at least one
/// individual), the pool tournaments draw from (spec §4.10).
#[must_use]
pub fn parent_pool(ranked: &[usize], parent_pool_percentage: f32) -> &[usize] {
    let pool_size = ((ranked.len() as f32 * parent_pool_percentage).ceil() as usize)
        .max(1)
        .min(ranked.len());
    &ranked[..pool_size]
}

/// Runs one tournament of `tournament_size` (clamped to the pool's length)
/// random draws from `pool`, returning the index (into `individuals`) of the
/// fittest contestant.
#[must_use]
pub fn tournament_select(
    individuals: &[Individual],
    pool: &[usize],
    tournament_size: usize,
    rng: &mut impl Rng,
) -> usize {
    let size = tournament_size.clamp(1, pool.len());
    let mut best = pool[rng.gen_range(0..pool.len())];
    for _ in 1..size {
        let candidate = pool[rng.gen_range(0..pool.len())];
        if individuals[candidate].fitness > individuals[best].fitness {
            best = candidate;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn individual_with_fitness(fitness: f32) -> Individual {
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
    fn rank_orders_best_first() {
        let individuals = vec![
            individual_with_fitness(1.0),
            individual_with_fitness(3.0),
            individual_with_fitness(2.0),
        ];
        assert_eq!(rank_by_fitness(&individuals), vec![1, 2, 0]);
    }

    #[test]
    fn parent_pool_is_at_least_one() {
        let ranked = vec![0, 1, 2, 3];
        assert_eq!(parent_pool(&ranked, 0.0).len(), 1);
        assert_eq!(parent_pool(&ranked, 0.5).len(), 2);
        assert_eq!(parent_pool(&ranked, 1.0).len(), 4);
    }

    #[test]
    fn tournament_is_clamped_to_pool_size_and_picks_best() {
        let individuals = vec![individual_with_fitness(5.0), individual_with_fitness(1.0)];
        let ranked = rank_by_fitness(&individuals);
        let pool = parent_pool(&ranked, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..20 {
            let winner = tournament_select(&individuals, pool, 10, &mut rng);
            assert_eq!(winner, 0);
        }
    }
}
