//! Per-individual representation: weights, biases, activation choices, and
//! activation parameters over a shared species topology (spec §3, component I).

use rand::Rng;

use crate::activation::Activation;
use crate::math::Scalar;
use crate::species::topology::Topology;

/// One candidate controller: per-edge weights, per-node biases, per-node
/// activation tag + 4 params, plus fitness/age bookkeeping.
///
/// Cloned by deep copy; mutation never aliases a parent's arrays (spec §3).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Individual {
    pub weights: Vec<Scalar>,
    pub biases: Vec<Scalar>,
    pub activations: Vec<Activation>,
    /// Flattened `node_count * 4` activation parameters.
    pub node_params: Vec<Scalar>,
    pub fitness: Scalar,
    pub age: u32,
}

impl Individual {
    /// Params for `node`, as a fixed-size slice view into `node_params`.
    #[must_use]
    pub fn params_of(&self, node: usize) -> &[Scalar; 4] {
        let slice = &self.node_params[node * 4..node * 4 + 4];
        slice.try_into().unwrap()
    }

    pub fn set_params_of(&mut self, node: usize, params: [Scalar; 4]) {
        self.node_params[node * 4..node * 4 + 4].copy_from_slice(&params);
    }

    /// Builds a fresh individual for `topology` with Glorot-uniform weights,
    /// zero biases, and a uniformly-chosen allowed activation per row
    /// (spec §4.7). Output-row nodes only draw from
    /// [`Activation::OUTPUT_ALLOWED`].
    pub fn random(topology: &Topology, rng: &mut impl Rng) -> Self {
        let node_count = topology.node_count();
        let edge_count = topology.edge_count();

        let fan_in = fan_in_counts(topology);
        let fan_out = fan_out_counts(topology);

        let weights = topology
            .edges()
            .iter()
            .map(|&(_, dst)| glorot_uniform(rng, fan_in[dst].max(1), fan_out[dst].max(1)))
            .collect();

        let mut activations = Vec::with_capacity(node_count);
        let mut node_params = Vec::with_capacity(node_count * 4);
        for node in 0..node_count {
            let row = topology.row_of(node);
            let mask = topology.allowed_activations(row);
            let activation = if row == topology.row_count() - 1 {
                choose_masked(rng, mask & output_mask())
            } else {
                choose_masked(rng, mask)
            };
            activations.push(activation);
            node_params.extend_from_slice(&activation.default_params());
        }

        Self {
            weights,
            biases: vec![0.0; node_count],
            activations,
            node_params,
            fitness: 0.0,
            age: 0,
        }
        .with_edge_len(edge_count)
    }

    fn with_edge_len(self, expected: usize) -> Self {
        debug_assert_eq!(self.weights.len(), expected);
        self
    }
}

fn output_mask() -> u16 {
    Activation::OUTPUT_ALLOWED.iter().fold(0, |acc, a| acc | a.bit())
}

fn choose_masked(rng: &mut impl Rng, mask: u16) -> Activation {
    let candidates: Vec<Activation> = Activation::ALL.into_iter().filter(|a| mask & a.bit() != 0).collect();
    debug_assert!(!candidates.is_empty(), "allowed-activation mask must be non-empty");
    candidates[rng.gen_range(0..candidates.len())]
}

fn fan_in_counts(topology: &Topology) -> Vec<usize> {
    let mut counts = vec![0usize; topology.node_count()];
    for &(_, dst) in topology.edges() {
        counts[dst] += 1;
    }
    counts
}

fn fan_out_counts(topology: &Topology) -> Vec<usize> {
    let mut counts = vec![0usize; topology.node_count()];
    for &(src, _) in topology.edges() {
        counts[src] += 1;
    }
    counts
}

/// Glorot/Xavier uniform initialization: draws from
/// `+/- sqrt(6 / (fan_in + fan_out))` (spec §4.7).
#[must_use]
pub fn glorot_uniform(rng: &mut impl Rng, fan_in: usize, fan_out: usize) -> Scalar {
    let limit = (6.0 / (fan_in + fan_out) as Scalar).sqrt();
    rng.gen_range(-limit..=limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn small_topology() -> Topology {
        Topology::new(
            vec![1, 2, 1],
            vec![
                Activation::Linear.bit(),
                Activation::ALL.iter().fold(0, |acc, a| acc | a.bit()),
                output_mask(),
            ],
            4,
            vec![(1, 3), (2, 3)],
        )
        .unwrap()
    }

    #[test]
    fn random_individual_has_matching_array_lengths() {
        let topo = small_topology();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let individual = Individual::random(&topo, &mut rng);
        assert_eq!(individual.weights.len(), topo.edge_count());
        assert_eq!(individual.biases.len(), topo.node_count());
        assert_eq!(individual.activations.len(), topo.node_count());
        assert_eq!(individual.node_params.len(), topo.node_count() * 4);
    }

    #[test]
    fn output_node_activation_is_restricted() {
        let topo = small_topology();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..20 {
            let individual = Individual::random(&topo, &mut rng);
            let last = *individual.activations.last().unwrap();
            assert!(last.is_output_allowed());
        }
    }

    #[test]
    fn deep_clone_does_not_alias() {
        let topo = small_topology();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let original = Individual::random(&topo, &mut rng);
        let mut clone = original.clone();
        clone.weights[0] += 1.0;
        assert_ne!(original.weights[0], clone.weights[0]);
    }
}
