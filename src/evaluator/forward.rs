//! Row-synchronous forward-pass evaluator (spec §4.6, component J).
//!
//! Row 0 is the constant-1 bias node, row 1 is the input row, and rows
//! `2..R` are evaluated in order: zero the row's nodes, accumulate
//! `dest += weight * value[src]` for every edge landing in the row, add the
//! row's biases, then apply each node's activation. Ordering of edges within
//! a row does not matter (addition is commutative), so plans from
//! [`crate::species::topology::Topology`] can be walked in array order with
//! no further scheduling.

use crate::individual::Individual;
use crate::math::Scalar;
use crate::species::topology::Topology;

/// Runs one forward pass, writing every node's value into `scratch` (sized
/// `topology.node_count()`, reused across calls to avoid per-call
/// allocation) and returning the output row as a slice of `scratch`.
///
/// `inputs.len()` must equal the input row's node count.
pub fn forward<'a>(
    topology: &Topology,
    individual: &Individual,
    inputs: &[Scalar],
    scratch: &'a mut Vec<Scalar>,
) -> &'a [Scalar] {
    let node_count = topology.node_count();
    scratch.clear();
    scratch.resize(node_count, 0.0);

    let plans = topology.row_plans();
    debug_assert_eq!(inputs.len(), plans[1].node_count, "input length must match row 1's size");

    // Row 0: constant bias node.
    scratch[plans[0].node_start] = 1.0;
    // Row 1: inputs, copied verbatim.
    scratch[plans[1].node_start..plans[1].node_start + plans[1].node_count].copy_from_slice(inputs);

    let edges = topology.edges();
    for plan in &plans[2..] {
        for value in &mut scratch[plan.node_start..plan.node_start + plan.node_count] {
            *value = 0.0;
        }
        for edge_idx in plan.edge_start..plan.edge_start + plan.edge_count {
            let (src, dst) = edges[edge_idx];
            scratch[dst] += individual.weights[edge_idx] * scratch[src];
        }
        for node in plan.node_start..plan.node_start + plan.node_count {
            let with_bias = scratch[node] + individual.biases[node];
            scratch[node] = individual.activations[node].apply(with_bias, individual.params_of(node));
        }
    }

    let output_plan = plans[plans.len() - 1];
    &scratch[output_plan.node_start..output_plan.node_start + output_plan.node_count]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use approx::assert_relative_eq;

    /// Scenario 3 of spec §8: hand-wired weights so the middle layer computes
    /// `[tanh(1), tanh(-1)]` and the output is their sum through unit weights.
    #[test]
    fn hand_wired_forward_pass() {
        let topology = Topology::new(
            vec![1, 2, 2, 1],
            vec![
                Activation::Linear.bit(),
                Activation::Linear.bit(),
                Activation::Tanh.bit(),
                Activation::Linear.bit(),
            ],
            4,
            vec![(1, 3), (2, 4), (3, 5), (4, 5)],
        )
        .unwrap();

        let mut individual = Individual {
            weights: vec![1.0, 1.0, 1.0, 1.0],
            biases: vec![0.0; topology.node_count()],
            activations: vec![
                Activation::Linear,
                Activation::Linear,
                Activation::Linear,
                Activation::Tanh,
                Activation::Tanh,
                Activation::Linear,
            ],
            node_params: vec![0.0; topology.node_count() * 4],
            fitness: 0.0,
            age: 0,
        };
        individual.activations[5] = Activation::Linear;

        let mut scratch = Vec::new();
        let output = forward(&topology, &individual, &[1.0, 0.0], &mut scratch);
        assert_relative_eq!(output[0], 1.0f32.tanh() + (-1.0f32).tanh(), epsilon = 1e-6);
        assert_relative_eq!(output[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn forward_pass_is_deterministic() {
        let topology = Topology::new(
            vec![1, 2, 2, 1],
            vec![
                Activation::Linear.bit(),
                Activation::Linear.bit(),
                Activation::ALL.iter().fold(0, |acc, a| acc | a.bit()),
                Activation::Linear.bit() | Activation::Tanh.bit(),
            ],
            4,
            vec![(1, 3), (1, 4), (2, 3), (2, 4), (3, 5), (4, 5), (0, 5)],
        )
        .unwrap();

        let mut rng = rand_chacha::ChaCha8Rng::from_seed([7u8; 32]);
        use rand::SeedableRng;
        let individual = Individual::random(&topology, &mut rng);

        let mut scratch_a = Vec::new();
        let mut scratch_b = Vec::new();
        let output_a = forward(&topology, &individual, &[0.3, -0.7], &mut scratch_a).to_vec();
        let output_b = forward(&topology, &individual, &[0.3, -0.7], &mut scratch_b).to_vec();
        assert_eq!(output_a, output_b);
    }
}
