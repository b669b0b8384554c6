//! Weak-edge pruning: edges with small mean absolute weight across a
//! species are probabilistically deleted (spec §4.9, component L).

use rand::Rng;

use crate::config::WeakEdgePruning;
use crate::individual::Individual;
use crate::math::Scalar;
use crate::species::connectivity::can_delete;
use crate::species::topology::Topology;

/// Mean absolute weight for each edge across every individual in the
/// species, in topology-edge order.
fn mean_abs_weights(topology: &Topology, individuals: &[Individual]) -> Vec<Scalar> {
    let edge_count = topology.edge_count();
    if individuals.is_empty() {
        return vec![0.0; edge_count];
    }
    let mut sums = vec![0.0; edge_count];
    for individual in individuals {
        for (idx, weight) in individual.weights.iter().enumerate() {
            sums[idx] += weight.abs();
        }
    }
    for sum in &mut sums {
        *sum /= individuals.len() as Scalar;
    }
    sums
}

/// Scans every edge once, deleting each edge whose mean absolute weight is
/// below `config.threshold` with probability `base_rate * (1 - mean_abs /
/// threshold)` — weaker edges are more likely to be pruned — skipping any
/// deletion that would disconnect an output. Edges are considered from
/// highest index to lowest so an earlier deletion never invalidates a later
/// index still to be visited.
///
/// Returns the number of edges actually deleted.
pub fn prune_weak_edges(
    topology: &mut Topology,
    individuals: &mut [Individual],
    config: &WeakEdgePruning,
    rng: &mut impl Rng,
) -> usize {
    let mut deleted = 0;
    let mean_abs = mean_abs_weights(topology, individuals);

    let mut idx = topology.edge_count();
    while idx > 0 {
        idx -= 1;
        let mean = mean_abs[idx];
        if mean >= config.threshold {
            continue;
        }
        let p_delete = config.base_rate * (1.0 - mean / config.threshold).max(0.0);
        if !rng.gen_bool(p_delete.clamp(0.0, 1.0) as f64) {
            continue;
        }
        if !can_delete(topology, idx) {
            continue;
        }
        topology.remove_edge(idx);
        for individual in individuals.iter_mut() {
            individual.weights.remove(idx);
        }
        deleted += 1;
    }
    deleted
}
