//! Connectivity validator: every output node must remain reachable from at
//! least one input node (spec §4.8, component K precondition).

use std::collections::{HashSet, VecDeque};

use super::topology::Topology;

/// BFS forward from row 1 (the input row) over a candidate edge list.
fn reachable_forward(node_count: usize, edges: &[(usize, usize)], sources: &[usize]) -> HashSet<usize> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(src, dst) in edges {
        adjacency[src].push(dst);
    }

    let mut visited: HashSet<usize> = sources.iter().copied().collect();
    let mut queue: VecDeque<usize> = sources.iter().copied().collect();
    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[node] {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    visited
}

/// BFS backward from the output row over a candidate edge list.
fn reachable_backward(node_count: usize, edges: &[(usize, usize)], sinks: &[usize]) -> HashSet<usize> {
    let mut reverse_adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(src, dst) in edges {
        reverse_adjacency[dst].push(src);
    }

    let mut visited: HashSet<usize> = sinks.iter().copied().collect();
    let mut queue: VecDeque<usize> = sinks.iter().copied().collect();
    while let Some(node) = queue.pop_front() {
        for &prev in &reverse_adjacency[node] {
            if visited.insert(prev) {
                queue.push_back(prev);
            }
        }
    }
    visited
}

fn input_nodes(topology: &Topology) -> Vec<usize> {
    let plan = topology.row_plans()[1];
    (plan.node_start..plan.node_start + plan.node_count).collect()
}

fn output_nodes(topology: &Topology) -> Vec<usize> {
    let plan = topology.row_plans()[topology.row_count() - 1];
    (plan.node_start..plan.node_start + plan.node_count).collect()
}

/// Returns `true` iff every output node is reachable from at least one input
/// node over `edges` (which may be a tentatively modified copy of the
/// topology's real edge list).
#[must_use]
pub fn is_connected(topology: &Topology, edges: &[(usize, usize)]) -> bool {
    let node_count = topology.node_count();
    let forward = reachable_forward(node_count, edges, &input_nodes(topology));
    let outputs = output_nodes(topology);
    outputs.iter().all(|node| forward.contains(node))
}

/// Returns `true` iff deleting `edges[idx]` would still leave every output
/// reachable from at least one input (spec §4.8).
#[must_use]
pub fn can_delete(topology: &Topology, idx: usize) -> bool {
    let mut edges = topology.edges().to_vec();
    edges.remove(idx);
    is_connected(topology, &edges)
}

/// The set of nodes that are both forward-reachable from an input and
/// backward-reachable from an output: the intersection used for
/// `active_nodes` diagnostics (spec §3, §4.8).
#[must_use]
pub fn active_nodes(topology: &Topology) -> Vec<bool> {
    let node_count = topology.node_count();
    let forward = reachable_forward(node_count, topology.edges(), &input_nodes(topology));
    let backward = reachable_backward(node_count, topology.edges(), &output_nodes(topology));
    (0..node_count)
        .map(|n| forward.contains(&n) && backward.contains(&n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;

    fn hidden_mask() -> u16 {
        Activation::ALL.iter().fold(0, |acc, a| acc | a.bit())
    }
    fn output_mask() -> u16 {
        Activation::Linear.bit() | Activation::Tanh.bit()
    }

    #[test]
    fn sole_path_cannot_be_deleted() {
        let topo = Topology::new(
            vec![1, 1, 1],
            vec![Activation::Linear.bit(), hidden_mask(), output_mask()],
            4,
            vec![(1, 2)],
        )
        .unwrap();
        assert!(!can_delete(&topo, 0));
    }

    #[test]
    fn redundant_path_can_be_deleted() {
        let topo = Topology::new(
            vec![1, 1, 1, 1],
            vec![
                Activation::Linear.bit(),
                hidden_mask(),
                hidden_mask(),
                output_mask(),
            ],
            4,
            vec![(1, 2), (2, 3), (1, 3)],
        )
        .unwrap();
        let direct_edge_idx = topo.edges().iter().position(|&e| e == (1, 3)).unwrap();
        assert!(can_delete(&topo, direct_edge_idx));
    }

    #[test]
    fn active_nodes_excludes_dead_ends() {
        let topo = Topology::new(
            vec![1, 1, 2, 1],
            vec![
                Activation::Linear.bit(),
                hidden_mask(),
                hidden_mask(),
                output_mask(),
            ],
            4,
            vec![(1, 2), (2, 4)],
        )
        .unwrap();
        let active = active_nodes(&topo);
        // Node 3 (the second hidden-row node) has no edges at all: inactive.
        assert!(!active[3]);
        assert!(active[1] && active[2] && active[4]);
    }
}
