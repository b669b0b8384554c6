//! Diversification: clone a surviving species' topology with a small
//! structural perturbation, carrying over weights/activations for any node
//! or edge whose identity survives the change (spec §4.12, §4.17,
//! component O).
//!
//! Node and edge "identity" is positional: `(row, offset-within-row)` for a
//! node, and the pair of its endpoints' identities for an edge. Perturbing
//! row sizes shifts raw node indices, but a node's `(row, offset)` is stable
//! as long as its offset stays below both the old and new row's size, so
//! inheritance is keyed on that pair rather than on raw indices.

use rand::Rng;

use crate::activation::Activation;
use crate::individual::{glorot_uniform, Individual};
use crate::math::Scalar;
use crate::species::topology::Topology;

const MAX_ROW_DELTA: i32 = 2;
const BOUNDED_RETRIES: u32 = 8;

fn node_identity(topology: &Topology, node: usize) -> (usize, usize) {
    let row = topology.row_of(node);
    let offset = node - topology.row_plans()[row].node_start;
    (row, offset)
}

fn node_by_identity(topology: &Topology, identity: (usize, usize)) -> Option<usize> {
    let (row, offset) = identity;
    let plan = topology.row_plans().get(row)?;
    if offset >= plan.node_count {
        return None;
    }
    Some(plan.node_start + offset)
}

fn perturb_row_counts(row_counts: &[usize], rng: &mut impl Rng) -> Vec<usize> {
    let last = row_counts.len() - 1;
    row_counts
        .iter()
        .enumerate()
        .map(|(row, &count)| {
            if row == 0 || row == 1 || row == last {
                // Bias row, input row, and output row are fixed by the
                // problem the species is evolved against.
                count
            } else {
                let delta = rng.gen_range(-MAX_ROW_DELTA..=MAX_ROW_DELTA);
                (count as i32 + delta).max(1) as usize
            }
        })
        .collect()
}

fn perturb_activation_masks(masks: &[u16], row_count: usize, rng: &mut impl Rng) -> Vec<u16> {
    let output_row = row_count - 1;
    masks
        .iter()
        .enumerate()
        .map(|(row, &mask)| {
            if row == 0 || row == output_row {
                mask
            } else {
                let toggle_bit = 1u16 << rng.gen_range(0..Activation::ALL.len() as u16);
                let candidate = mask ^ toggle_bit;
                if candidate == 0 {
                    mask
                } else {
                    candidate
                }
            }
        })
        .collect()
}

fn perturb_max_in_degree(value: usize, rng: &mut impl Rng) -> usize {
    let delta: i32 = rng.gen_range(-1..=1);
    (value as i32 + delta).max(1) as usize
}

/// Builds one perturbed candidate topology. Edges are regenerated from the
/// source topology's edges, keeping any endpoint whose identity still
/// exists in the new row layout and dropping edges whose endpoint identity
/// no longer resolves (a shrunk row dropped that offset).
fn build_candidate(source: &Topology, rng: &mut impl Rng) -> Option<Topology> {
    let row_counts = perturb_row_counts(source.row_counts(), rng);
    let masks = perturb_activation_masks(source.allowed_activations_per_row(), row_counts.len(), rng);
    let max_in_degree = perturb_max_in_degree(source.max_in_degree(), rng);

    let candidate_node_count: usize = row_counts.iter().sum();
    let scratch = Topology::new(row_counts, masks, max_in_degree, Vec::new()).ok()?;
    debug_assert_eq!(scratch.node_count(), candidate_node_count);

    let mut edges = Vec::new();
    for &(src, dst) in source.edges() {
        let src_id = node_identity(source, src);
        let dst_id = node_identity(source, dst);
        if let (Some(new_src), Some(new_dst)) = (node_by_identity(&scratch, src_id), node_by_identity(&scratch, dst_id)) {
            if scratch.row_of(new_src) < scratch.row_of(new_dst) {
                edges.push((new_src, new_dst));
            }
        }
    }

    Topology::new(
        scratch.row_counts().to_vec(),
        scratch.allowed_activations_per_row().to_vec(),
        scratch.max_in_degree(),
        edges,
    )
    .ok()
}

/// Builds an offspring individual for `new_topology`, inheriting weights,
/// biases, activations, and params from `parent` wherever the corresponding
/// edge/node identity survived, and drawing fresh Glorot/random values
/// everywhere else.
fn inherit_individual(source_topology: &Topology, new_topology: &Topology, parent: &Individual, rng: &mut impl Rng) -> Individual {
    let node_count = new_topology.node_count();
    let mut biases = vec![0.0; node_count];
    let mut activations = Vec::with_capacity(node_count);
    let mut node_params = vec![0.0; node_count * 4];

    for node in 0..node_count {
        let identity = node_identity(new_topology, node);
        let row = new_topology.row_of(node);
        let output_row = new_topology.row_count() - 1;
        let mask = new_topology.allowed_activations(row);

        if let Some(old_node) = node_by_identity(source_topology, identity) {
            biases[node] = parent.biases[old_node];
            let inherited = parent.activations[old_node];
            let allowed = mask & inherited.bit() != 0;
            activations.push(if allowed { inherited } else { random_activation(mask, rng) });
            let params = if allowed { *parent.params_of(old_node) } else { activations[node].default_params() };
            node_params[node * 4..node * 4 + 4].copy_from_slice(&params);
        } else {
            let restricted_mask = if row == output_row {
                mask & (Activation::Linear.bit() | Activation::Tanh.bit())
            } else {
                mask
            };
            let activation = random_activation(restricted_mask, rng);
            activations.push(activation);
            node_params[node * 4..node * 4 + 4].copy_from_slice(&activation.default_params());
        }
    }

    let mut weights = Vec::with_capacity(new_topology.edge_count());
    for &(src, dst) in new_topology.edges() {
        let src_id = node_identity(new_topology, src);
        let dst_id = node_identity(new_topology, dst);
        let inherited = node_by_identity(source_topology, src_id).and_then(|old_src| {
            node_by_identity(source_topology, dst_id).and_then(|old_dst| {
                source_topology
                    .edges()
                    .iter()
                    .position(|&e| e == (old_src, old_dst))
                    .map(|idx| parent.weights[idx])
            })
        });
        weights.push(inherited.unwrap_or_else(|| {
            let fan_in = new_topology.in_degree(dst).max(1);
            let fan_out = new_topology
                .edges()
                .iter()
                .filter(|&&(s, _)| s == src)
                .count()
                .max(1);
            glorot_uniform(rng, fan_in, fan_out)
        }));
    }

    Individual {
        weights,
        biases,
        activations,
        node_params,
        fitness: 0.0,
        age: 0,
    }
}

fn random_activation(mask: u16, rng: &mut impl Rng) -> Activation {
    let candidates: Vec<Activation> = Activation::ALL.into_iter().filter(|a| mask & a.bit() != 0).collect();
    candidates[rng.gen_range(0..candidates.len())]
}

/// Produces a new species' topology and individuals by perturbing `source`.
/// Retries up to [`BOUNDED_RETRIES`] times to find a valid perturbed
/// candidate; if none validates, falls back to an unperturbed clone of
/// `source` (spec §4.17).
pub fn diversify(source_topology: &Topology, parents: &[Individual], rng: &mut impl Rng) -> (Topology, Vec<Individual>) {
    let new_topology = (0..BOUNDED_RETRIES)
        .find_map(|_| build_candidate(source_topology, rng))
        .unwrap_or_else(|| source_topology.clone());

    let individuals = parents
        .iter()
        .map(|parent| inherit_individual(source_topology, &new_topology, parent, rng))
        .collect();

    (new_topology, individuals)
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

    fn source() -> (Topology, Vec<Individual>) {
        let topo = Topology::new(
            vec![1, 2, 3, 1],
            vec![Activation::Linear.bit(), hidden_mask(), hidden_mask(), output_mask()],
            4,
            vec![(1, 3), (2, 4), (3, 6), (4, 6), (5, 6), (0, 6)],
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(20);
        let individuals = vec![Individual::random(&topo, &mut rng), Individual::random(&topo, &mut rng)];
        (topo, individuals)
    }

    #[test]
    fn diversified_topology_is_valid() {
        let (topo, individuals) = source();
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let (new_topo, new_individuals) = diversify(&topo, &individuals, &mut rng);
        assert!(new_topo.validate().is_ok());
        for individual in &new_individuals {
            assert_eq!(individual.weights.len(), new_topo.edge_count());
            assert_eq!(individual.biases.len(), new_topo.node_count());
        }
    }

    #[test]
    fn input_and_output_row_sizes_are_preserved() {
        let (topo, individuals) = source();
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let (new_topo, _) = diversify(&topo, &individuals, &mut rng);
        assert_eq!(new_topo.row_counts()[0], topo.row_counts()[0]);
        assert_eq!(new_topo.row_counts()[1], topo.row_counts()[1]);
        assert_eq!(*new_topo.row_counts().last().unwrap(), *topo.row_counts().last().unwrap());
    }

    #[test]
    fn fallback_produces_clone_when_retries_exhausted() {
        // A minimal topology where any row perturbation away from its
        // current size still validates, so this mostly exercises that
        // the fallback path itself (if ever hit) stays valid too.
        let (topo, individuals) = source();
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let (new_topo, _) = diversify(&topo, &individuals, &mut rng);
        assert!(new_topo.node_count() > 0);
    }
}
