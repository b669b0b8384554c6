//! Mutation operators (spec §4.7, component K).
//!
//! Weight/activation/param mutation acts on one [`Individual`] at a time.
//! Topology mutation acts on a species' shared [`Topology`] and must keep
//! every individual's per-edge arrays index-aligned with it, so those
//! operators take the whole species' individual slice and insert/remove the
//! matching array entry everywhere the topology's edge list does.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::activation::Activation;
use crate::config::{MutationRates, TopologyRates};
use crate::error::MutationOutcome;
use crate::individual::{glorot_uniform, Individual};
use crate::math::Scalar;
use crate::species::connectivity::can_delete;
use crate::species::topology::Topology;

/// Applies every weight/activation/param operator to `individual` once,
/// each gated by its own independent probability roll (spec §4.7).
pub fn mutate_individual(
    individual: &mut Individual,
    topology: &Topology,
    rates: &MutationRates,
    rng: &mut impl Rng,
) {
    jitter_weights(individual, rates, rng);
    maybe_reset_weight(individual, topology, rates, rng);
    maybe_shrink_weights(individual, rates, rng);
    maybe_swap_activation(individual, topology, rates, rng);
    maybe_jitter_params(individual, rates, rng);
}

/// Per-weight Gaussian jitter: `w += N(0, max(jitter_stddev * |w|, floor))`,
/// rolled independently for every weight.
pub fn jitter_weights(individual: &mut Individual, rates: &MutationRates, rng: &mut impl Rng) {
    for weight in &mut individual.weights {
        if rng.gen_bool(rates.p_jitter as f64) {
            let sigma = (rates.jitter_stddev * weight.abs()).max(rates.jitter_stddev_floor);
            let normal = Normal::new(0.0, sigma as f64).unwrap();
            *weight += normal.sample(rng) as Scalar;
        }
    }
}

/// With probability `p_reset`, reinitializes one random weight from a fresh
/// Glorot draw (spec §4.7's "reset" operator).
pub fn maybe_reset_weight(
    individual: &mut Individual,
    topology: &Topology,
    rates: &MutationRates,
    rng: &mut impl Rng,
) {
    if individual.weights.is_empty() || !rng.gen_bool(rates.p_reset as f64) {
        return;
    }
    let idx = rng.gen_range(0..individual.weights.len());
    let (_, dst) = topology.edges()[idx];
    let fan_in = topology.in_degree(dst).max(1);
    let fan_out = topology
        .edges()
        .iter()
        .filter(|&&(src, _)| src == dst)
        .count()
        .max(1);
    individual.weights[idx] = glorot_uniform(rng, fan_in, fan_out);
}

/// With probability `p_shrink`, multiplies every weight by `shrink_factor`
/// (an L1-ish pull toward zero; spec §4.7).
pub fn maybe_shrink_weights(individual: &mut Individual, rates: &MutationRates, rng: &mut impl Rng) {
    if rng.gen_bool(rates.p_shrink as f64) {
        for weight in &mut individual.weights {
            *weight *= rates.shrink_factor;
        }
    }
}

/// With probability `p_act`, swaps one non-bias node's activation for
/// another allowed activation for its row (output rows stay within
/// [`Activation::OUTPUT_ALLOWED`] because the row's own mask already
/// excludes everything else).
pub fn maybe_swap_activation(
    individual: &mut Individual,
    topology: &Topology,
    rates: &MutationRates,
    rng: &mut impl Rng,
) {
    if topology.node_count() <= 1 || !rng.gen_bool(rates.p_act as f64) {
        return;
    }
    let node = rng.gen_range(1..topology.node_count());
    let mask = topology.allowed_activations(topology.row_of(node));
    let candidates: Vec<Activation> = Activation::ALL.into_iter().filter(|a| mask & a.bit() != 0).collect();
    if candidates.is_empty() {
        return;
    }
    let chosen = candidates[rng.gen_range(0..candidates.len())];
    individual.activations[node] = chosen;
    individual.set_params_of(node, chosen.default_params());
}

/// With probability `p_params`, jitters every component of one random node's
/// activation params by `N(0, params_stddev)`.
pub fn maybe_jitter_params(individual: &mut Individual, rates: &MutationRates, rng: &mut impl Rng) {
    if topology_is_empty(individual) || !rng.gen_bool(rates.p_params as f64) {
        return;
    }
    let node = rng.gen_range(0..individual.activations.len());
    let normal = Normal::new(0.0, rates.params_stddev as f64).unwrap();
    let mut params = *individual.params_of(node);
    for p in &mut params {
        *p += normal.sample(rng) as Scalar;
    }
    individual.set_params_of(node, params);
}

fn topology_is_empty(individual: &Individual) -> bool {
    individual.activations.is_empty()
}

/// Inserts a matching entry at `idx` into every individual's weight array,
/// mirroring a topology edge insertion at the same index.
fn insert_weight_everywhere(individuals: &mut [Individual], idx: usize, weight: Scalar) {
    for individual in individuals {
        individual.weights.insert(idx, weight);
    }
}

/// Removes the entry at `idx` from every individual's weight array,
/// mirroring a topology edge removal at the same index.
fn remove_weight_everywhere(individuals: &mut [Individual], idx: usize) {
    for individual in individuals {
        individual.weights.remove(idx);
    }
}

/// Runs every topology operator once against `topology`/`individuals`, each
/// gated by its own probability in `rates` (spec §4.7).
pub fn mutate_topology(
    topology: &mut Topology,
    individuals: &mut [Individual],
    rates: &TopologyRates,
    rng: &mut impl Rng,
) {
    if rng.gen_bool(rates.p_edge_add as f64) {
        edge_add(topology, individuals, rng);
    }
    if rng.gen_bool(rates.p_edge_delete as f64) {
        edge_delete(topology, individuals, rng);
    }
    if rng.gen_bool(rates.p_edge_split as f64) {
        edge_split(topology, individuals, rng);
    }
    if rng.gen_bool(rates.p_edge_redirect as f64) {
        edge_redirect(topology, individuals, rng);
    }
    if rng.gen_bool(rates.p_edge_duplicate as f64) {
        edge_duplicate(topology, individuals, rng);
    }
    if rng.gen_bool(rates.p_edge_merge as f64) {
        edge_merge(topology, individuals, rng);
    }
    if rng.gen_bool(rates.p_edge_swap as f64) {
        edge_swap(topology, individuals, rng);
    }
}

/// Adds a random forward edge `(src, dst)` with `row(src) < row(dst)`,
/// rejecting if it would exceed the parallel-edge cap or `max_in_degree`.
pub fn edge_add(topology: &mut Topology, individuals: &mut [Individual], rng: &mut impl Rng) -> MutationOutcome {
    let node_count = topology.node_count();
    if node_count < 2 {
        return MutationOutcome::NoCandidate;
    }
    for _ in 0..16 {
        let src = rng.gen_range(0..node_count);
        let dst = rng.gen_range(0..node_count);
        if topology.row_of(src) >= topology.row_of(dst) {
            continue;
        }
        if topology.parallel_edge_count(src, dst) >= 2 {
            continue;
        }
        if topology.in_degree(dst) + 1 > topology.max_in_degree() {
            continue;
        }
        let fan_in = (topology.in_degree(dst) + 1).max(1);
        let fan_out = topology
            .edges()
            .iter()
            .filter(|&&(s, _)| s == src)
            .count()
            .max(1)
            + 1;
        let weight = glorot_uniform(rng, fan_in, fan_out);
        let idx = topology.insert_edge_sorted(src, dst);
        insert_weight_everywhere(individuals, idx, weight);
        return MutationOutcome::Applied;
    }
    MutationOutcome::NoCandidate
}

/// Deletes a random edge, rejecting if doing so would leave an output
/// unreachable from any input (spec §4.8).
pub fn edge_delete(topology: &mut Topology, individuals: &mut [Individual], rng: &mut impl Rng) -> MutationOutcome {
    let edge_count = topology.edge_count();
    if edge_count == 0 {
        return MutationOutcome::NoCandidate;
    }
    let idx = rng.gen_range(0..edge_count);
    if !can_delete(topology, idx) {
        return MutationOutcome::WouldDisconnect;
    }
    topology.remove_edge(idx);
    remove_weight_everywhere(individuals, idx);
    MutationOutcome::Applied
}

/// Splits a random edge `(src, dst)` through an existing node in an
/// intermediate row, replacing it with `src -> mid` and `mid -> dst`.
pub fn edge_split(topology: &mut Topology, individuals: &mut [Individual], rng: &mut impl Rng) -> MutationOutcome {
    let edge_count = topology.edge_count();
    if edge_count == 0 {
        return MutationOutcome::NoCandidate;
    }
    let idx = rng.gen_range(0..edge_count);
    let (src, dst) = topology.edges()[idx];
    let src_row = topology.row_of(src);
    let dst_row = topology.row_of(dst);
    if dst_row < src_row + 2 {
        return MutationOutcome::NoCandidate;
    }
    let mid_row = rng.gen_range(src_row + 1..dst_row);
    let plan = topology.row_plans()[mid_row];
    if plan.node_count == 0 {
        return MutationOutcome::NoCandidate;
    }
    let mid = plan.node_start + rng.gen_range(0..plan.node_count);

    if topology.parallel_edge_count(src, mid) >= 2 || topology.parallel_edge_count(mid, dst) >= 2 {
        return MutationOutcome::EdgeExists;
    }
    if topology.in_degree(mid) + 1 > topology.max_in_degree()
        || topology.in_degree(dst) + 1 > topology.max_in_degree()
    {
        return MutationOutcome::DegreeExceeded;
    }

    topology.remove_edge(idx);
    remove_weight_everywhere(individuals, idx);

    let idx_a = topology.insert_edge_sorted(src, mid);
    insert_weight_everywhere(individuals, idx_a, 1.0);
    let idx_b = topology.insert_edge_sorted(mid, dst);
    insert_weight_everywhere(individuals, idx_b, 1.0);
    MutationOutcome::Applied
}

/// Redirects a random edge's destination to a different later-row node,
/// preserving its weight in every individual.
pub fn edge_redirect(topology: &mut Topology, individuals: &mut [Individual], rng: &mut impl Rng) -> MutationOutcome {
    let edge_count = topology.edge_count();
    if edge_count == 0 {
        return MutationOutcome::NoCandidate;
    }
    let idx = rng.gen_range(0..edge_count);
    let (src, old_dst) = topology.edges()[idx];
    let src_row = topology.row_of(src);
    let node_count = topology.node_count();

    for _ in 0..16 {
        let new_dst = rng.gen_range(0..node_count);
        if new_dst == old_dst || topology.row_of(new_dst) <= src_row {
            continue;
        }
        if topology.parallel_edge_count(src, new_dst) >= 2 {
            continue;
        }
        if topology.in_degree(new_dst) + 1 > topology.max_in_degree() {
            continue;
        }
        if !can_delete(topology, idx) {
            let mut edges = topology.edges().to_vec();
            edges[idx] = (src, new_dst);
            if !crate::species::connectivity::is_connected(topology, &edges) {
                continue;
            }
        }
        let weight = weight_at(individuals, idx);
        topology.remove_edge(idx);
        remove_weight_everywhere(individuals, idx);
        let new_idx = topology.insert_edge_sorted(src, new_dst);
        insert_weight_everywhere(individuals, new_idx, weight);
        return MutationOutcome::Applied;
    }
    MutationOutcome::NoCandidate
}

/// Duplicates a random edge as a parallel copy with a fresh Glorot weight,
/// rejecting if the pair is already at the parallel-edge cap.
pub fn edge_duplicate(topology: &mut Topology, individuals: &mut [Individual], rng: &mut impl Rng) -> MutationOutcome {
    let edge_count = topology.edge_count();
    if edge_count == 0 {
        return MutationOutcome::NoCandidate;
    }
    let idx = rng.gen_range(0..edge_count);
    let (src, dst) = topology.edges()[idx];
    if topology.parallel_edge_count(src, dst) >= 2 {
        return MutationOutcome::EdgeExists;
    }
    if topology.in_degree(dst) + 1 > topology.max_in_degree() {
        return MutationOutcome::DegreeExceeded;
    }
    let fan_in = (topology.in_degree(dst) + 1).max(1);
    let fan_out = 1;
    let weight = glorot_uniform(rng, fan_in, fan_out);
    let new_idx = topology.insert_edge_sorted(src, dst);
    insert_weight_everywhere(individuals, new_idx, weight);
    MutationOutcome::Applied
}

/// Merges a random parallel-edge pair into one edge carrying the summed
/// weight (the inverse of `edge_duplicate`).
pub fn edge_merge(topology: &mut Topology, individuals: &mut [Individual], rng: &mut impl Rng) -> MutationOutcome {
    let edges = topology.edges().to_vec();
    let mut pairs = Vec::new();
    for i in 0..edges.len() {
        for j in i + 1..edges.len() {
            if edges[i] == edges[j] {
                pairs.push((i, j));
            }
        }
    }
    if pairs.is_empty() {
        return MutationOutcome::NoCandidate;
    }
    let (first, second) = pairs[rng.gen_range(0..pairs.len())];

    for individual in individuals.iter_mut() {
        let merged = individual.weights[first] + individual.weights[second];
        individual.weights[first] = merged;
    }
    topology.remove_edge(second);
    remove_weight_everywhere_at(individuals, second);
    MutationOutcome::Applied
}

fn remove_weight_everywhere_at(individuals: &mut [Individual], idx: usize) {
    for individual in individuals {
        individual.weights.remove(idx);
    }
}

/// Swaps the destinations of two random edges sharing no node, rejecting if
/// either resulting edge would break a row ordering, degree bound, or
/// connectivity.
pub fn edge_swap(topology: &mut Topology, individuals: &mut [Individual], rng: &mut impl Rng) -> MutationOutcome {
    let edge_count = topology.edge_count();
    if edge_count < 2 {
        return MutationOutcome::NoCandidate;
    }
    for _ in 0..16 {
        let i = rng.gen_range(0..edge_count);
        let j = rng.gen_range(0..edge_count);
        if i == j {
            continue;
        }
        let (src_i, dst_i) = topology.edges()[i];
        let (src_j, dst_j) = topology.edges()[j];
        if topology.row_of(src_i) >= topology.row_of(dst_j) || topology.row_of(src_j) >= topology.row_of(dst_i) {
            continue;
        }
        if (src_i, dst_j) == (src_j, dst_i) {
            continue;
        }
        if topology.parallel_edge_count(src_i, dst_j) >= 2 || topology.parallel_edge_count(src_j, dst_i) >= 2 {
            continue;
        }

        let mut edges = topology.edges().to_vec();
        edges[i] = (src_i, dst_j);
        edges[j] = (src_j, dst_i);
        if !crate::species::connectivity::is_connected(topology, &edges) {
            continue;
        }

        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let weight_lo = weight_at(individuals, lo);
        let weight_hi = weight_at(individuals, hi);
        let (new_lo, new_hi) = (edges[lo], edges[hi]);

        topology.remove_edge(hi);
        remove_weight_everywhere(individuals, hi);
        topology.remove_edge(lo);
        remove_weight_everywhere(individuals, lo);

        let idx_a = topology.insert_edge_sorted(new_lo.0, new_lo.1);
        insert_weight_everywhere(individuals, idx_a, weight_lo);
        let idx_b = topology.insert_edge_sorted(new_hi.0, new_hi.1);
        insert_weight_everywhere(individuals, idx_b, weight_hi);
        return MutationOutcome::Applied;
    }
    MutationOutcome::NoCandidate
}

fn weight_at(individuals: &[Individual], idx: usize) -> Scalar {
    individuals.first().map_or(0.0, |i| i.weights[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn hidden_mask() -> u16 {
        Activation::ALL.iter().fold(0, |acc, a| acc | a.bit())
    }
    fn output_mask() -> u16 {
        Activation::Linear.bit() | Activation::Tanh.bit()
    }

    fn sample_topology() -> Topology {
        Topology::new(
            vec![1, 2, 2, 1],
            vec![Activation::Linear.bit(), hidden_mask(), hidden_mask(), output_mask()],
            8,
            vec![(1, 3), (2, 4), (3, 5), (4, 5), (0, 5)],
        )
        .unwrap()
    }

    #[test]
    fn jitter_keeps_weight_count_stable() {
        let topo = sample_topology();
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let mut individual = Individual::random(&topo, &mut rng);
        let before_len = individual.weights.len();
        jitter_weights(&mut individual, &MutationRates::default(), &mut rng);
        assert_eq!(individual.weights.len(), before_len);
    }

    #[test]
    fn edge_add_keeps_topology_and_weights_aligned() {
        let mut topo = sample_topology();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut individuals = vec![Individual::random(&topo, &mut rng), Individual::random(&topo, &mut rng)];
        for _ in 0..20 {
            let outcome = edge_add(&mut topo, &mut individuals, &mut rng);
            if outcome.applied() {
                for individual in &individuals {
                    assert_eq!(individual.weights.len(), topo.edge_count());
                }
                assert!(topo.validate().is_ok());
                return;
            }
        }
        panic!("edge_add never applied across 20 attempts");
    }

    #[test]
    fn edge_delete_rejects_sole_path() {
        let mut topo = Topology::new(
            vec![1, 1, 1],
            vec![Activation::Linear.bit(), hidden_mask(), output_mask()],
            4,
            vec![(1, 2)],
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut individuals = vec![Individual::random(&topo, &mut rng)];
        let outcome = edge_delete(&mut topo, &mut individuals, &mut rng);
        assert_eq!(outcome, MutationOutcome::WouldDisconnect);
        assert_eq!(topo.edge_count(), 1);
    }

    #[test]
    fn edge_merge_sums_weights_and_drops_one_edge() {
        let mut topo = Topology::new(
            vec![1, 1, 1],
            vec![Activation::Linear.bit(), hidden_mask(), output_mask()],
            4,
            vec![(1, 2), (1, 2)],
        )
        .unwrap();
        let mut individuals = vec![Individual {
            weights: vec![2.0, 3.0],
            biases: vec![0.0; topo.node_count()],
            activations: vec![Activation::Linear, Activation::Tanh, Activation::Linear],
            node_params: vec![0.0; topo.node_count() * 4],
            fitness: 0.0,
            age: 0,
        }];
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let outcome = edge_merge(&mut topo, &mut individuals, &mut rng);
        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(topo.edge_count(), 1);
        assert_eq!(individuals[0].weights.len(), 1);
        assert_eq!(individuals[0].weights[0], 5.0);
    }
}
