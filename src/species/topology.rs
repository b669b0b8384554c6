//! Species topology: a row-layer DAG description that compiles to per-row
//! `(node_range, edge_range)` plans (spec §4.5, component H).
//!
//! Edges are kept sorted by destination *at all times* — insertion and
//! removal both preserve the sort order in place — rather than being
//! appended and re-sorted wholesale before each `build_row_plans`. This is
//! the stable-edge-ID approach spec §4.5/§4.7/§9 prescribes for `EdgeMerge`:
//! an edge's array index never moves out from under a caller holding it,
//! so an individual's `weights` array stays index-aligned with `edges`
//! without a separate post-sort permutation step.

use crate::activation::Activation;
use crate::error::TopologyError;

/// A compiled per-row execution plan (spec glossary: "Row plan").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowPlan {
    pub node_start: usize,
    pub node_count: usize,
    pub edge_start: usize,
    pub edge_count: usize,
}

/// A row-layer DAG topology shared by every individual in a species
/// (spec §3, §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    row_counts: Vec<usize>,
    allowed_activations_per_row: Vec<u16>,
    max_in_degree: usize,
    /// `(src, dst)` pairs, always kept sorted by `dst` (ties broken by
    /// insertion order, i.e. a stable sort).
    edges: Vec<(usize, usize)>,
    row_plans: Vec<RowPlan>,
}

impl Topology {
    /// Builds a topology with the given row sizes and per-row allowed
    /// activation masks, validating invariants and compiling row plans.
    pub fn new(
        row_counts: Vec<usize>,
        allowed_activations_per_row: Vec<u16>,
        max_in_degree: usize,
        edges: Vec<(usize, usize)>,
    ) -> Result<Self, TopologyError> {
        let mut topology = Self {
            row_counts,
            allowed_activations_per_row,
            max_in_degree,
            edges,
            row_plans: Vec::new(),
        };
        topology.edges.sort_by_key(|&(_, dst)| dst);
        topology.rebuild_row_plans();
        topology.validate()?;
        Ok(topology)
    }

    #[must_use]
    pub fn row_counts(&self) -> &[usize] {
        &self.row_counts
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_counts.len()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.row_counts.iter().sum()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    #[must_use]
    pub fn row_plans(&self) -> &[RowPlan] {
        &self.row_plans
    }

    #[must_use]
    pub fn max_in_degree(&self) -> usize {
        self.max_in_degree
    }

    pub fn set_max_in_degree(&mut self, value: usize) {
        self.max_in_degree = value;
    }

    #[must_use]
    pub fn allowed_activations(&self, row: usize) -> u16 {
        self.allowed_activations_per_row[row]
    }

    pub fn set_allowed_activations(&mut self, row: usize, mask: u16) {
        self.allowed_activations_per_row[row] = mask;
    }

    #[must_use]
    pub fn allowed_activations_per_row(&self) -> &[u16] {
        &self.allowed_activations_per_row
    }

    /// Returns the row index containing `node`.
    #[must_use]
    pub fn row_of(&self, node: usize) -> usize {
        let mut acc = 0;
        for (row, &count) in self.row_counts.iter().enumerate() {
            if node < acc + count {
                return row;
            }
            acc += count;
        }
        panic!("node {node} out of range for topology with {} nodes", self.node_count());
    }

    #[must_use]
    pub fn is_output_node(&self, node: usize) -> bool {
        self.row_of(node) == self.row_counts.len() - 1
    }

    #[must_use]
    pub fn is_bias_node(&self, node: usize) -> bool {
        node == 0
    }

    #[must_use]
    pub fn in_degree(&self, node: usize) -> usize {
        self.edges.iter().filter(|&&(_, dst)| dst == node).count()
    }

    #[must_use]
    pub fn parallel_edge_count(&self, src: usize, dst: usize) -> usize {
        self.edges.iter().filter(|&&e| e == (src, dst)).count()
    }

    /// Recomputes `row_plans` from the current (sorted-by-dst) `row_counts`
    /// and `edges`. Idempotent: calling it twice in a row with unchanged
    /// input produces the same output (spec §8 round-trip property).
    pub fn rebuild_row_plans(&mut self) {
        let mut plans = Vec::with_capacity(self.row_counts.len());
        let mut node_start = 0;
        for &count in &self.row_counts {
            let node_end = node_start + count;
            let edge_start = self
                .edges
                .partition_point(|&(_, dst)| dst < node_start);
            let edge_end = self.edges.partition_point(|&(_, dst)| dst < node_end);
            plans.push(RowPlan {
                node_start,
                node_count: count,
                edge_start,
                edge_count: edge_end - edge_start,
            });
            node_start = node_end;
        }
        self.row_plans = plans;
    }

    /// Validates all structural invariants (spec §4.5): non-empty rows,
    /// single-node bias row, no backward edges, in-degree bound, at-most-two
    /// parallel edges, and output-row activation restricted to
    /// `{Linear, Tanh}`.
    pub fn validate(&self) -> Result<(), TopologyError> {
        for (row, &count) in self.row_counts.iter().enumerate() {
            if count == 0 {
                return Err(TopologyError::EmptyRow(row));
            }
        }
        if self.row_counts[0] != 1 {
            return Err(TopologyError::BadBiasRow(self.row_counts[0]));
        }

        for &(src, dst) in &self.edges {
            if self.row_of(src) >= self.row_of(dst) {
                return Err(TopologyError::BackwardEdge { src, dst });
            }
        }

        for node in 0..self.node_count() {
            let degree = self.in_degree(node);
            if degree > self.max_in_degree {
                return Err(TopologyError::DegreeExceeded {
                    node,
                    max_in_degree: self.max_in_degree,
                });
            }
        }

        let mut seen = std::collections::HashMap::new();
        for &(src, dst) in &self.edges {
            let count = seen.entry((src, dst)).or_insert(0);
            *count += 1;
            if *count > 2 {
                return Err(TopologyError::TooManyParallelEdges { src, dst });
            }
        }

        let output_row = self.row_counts.len() - 1;
        let allowed = self.allowed_activations_per_row[output_row];
        let forbidden_bits = !(Activation::Linear.bit() | Activation::Tanh.bit());
        if allowed & forbidden_bits != 0 {
            let plan = &self.row_plans[output_row];
            return Err(TopologyError::ForbiddenOutputActivation { node: plan.node_start });
        }

        Ok(())
    }

    /// Inserts `(src, dst)` at the position that keeps `edges` sorted by
    /// `dst` (ties appended after existing same-`dst` edges, preserving
    /// stability), rebuilds row plans, and returns the new edge's index.
    /// Callers must insert a matching weight at the same index in every
    /// individual's weight array (spec §4.5).
    pub fn insert_edge_sorted(&mut self, src: usize, dst: usize) -> usize {
        let pos = self.edges.partition_point(|&(_, d)| d <= dst);
        self.edges.insert(pos, (src, dst));
        self.rebuild_row_plans();
        pos
    }

    /// Removes the edge at `idx`. Callers must remove the matching weight at
    /// the same index from every individual's weight array.
    pub fn remove_edge(&mut self, idx: usize) -> (usize, usize) {
        let edge = self.edges.remove(idx);
        self.rebuild_row_plans();
        edge
    }

    /// Replaces the edge at `idx` with a new `(src, dst)` pair, re-sorting if
    /// necessary. Returns the edge's new index (unchanged index if the sort
    /// position did not move). Used by `EdgeRedirect`/`EdgeSwap`.
    pub fn replace_edge(&mut self, idx: usize, src: usize, dst: usize) -> usize {
        self.edges.remove(idx);
        self.insert_edge_sorted(src, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;

    fn bias_mask() -> u16 {
        Activation::Linear.bit()
    }

    fn hidden_mask() -> u16 {
        Activation::ALL.iter().fold(0, |acc, a| acc | a.bit())
    }

    fn output_mask() -> u16 {
        Activation::Linear.bit() | Activation::Tanh.bit()
    }

    #[test]
    fn valid_topology_builds_row_plans() {
        let topo = Topology::new(
            vec![1, 2, 1],
            vec![bias_mask(), hidden_mask(), output_mask()],
            4,
            vec![(1, 2), (2, 3), (0, 2)],
        )
        .unwrap();
        assert_eq!(topo.row_plans().len(), 3);
        assert_eq!(topo.row_plans()[2].node_start, 3);
        assert_eq!(topo.row_plans()[2].node_count, 1);
    }

    #[test]
    fn backward_edge_rejected() {
        let result = Topology::new(
            vec![1, 2, 1],
            vec![bias_mask(), hidden_mask(), output_mask()],
            4,
            vec![(3, 1)],
        );
        assert!(matches!(result, Err(TopologyError::BackwardEdge { .. })));
    }

    #[test]
    fn too_many_parallel_edges_rejected() {
        let result = Topology::new(
            vec![1, 1, 1],
            vec![bias_mask(), hidden_mask(), output_mask()],
            4,
            vec![(1, 2), (1, 2), (1, 2)],
        );
        assert!(matches!(result, Err(TopologyError::TooManyParallelEdges { .. })));
    }

    #[test]
    fn forbidden_output_activation_rejected() {
        let result = Topology::new(
            vec![1, 1, 1],
            vec![bias_mask(), hidden_mask(), Activation::ReLU.bit()],
            4,
            vec![(1, 2)],
        );
        assert!(matches!(result, Err(TopologyError::ForbiddenOutputActivation { .. })));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut topo = Topology::new(
            vec![1, 2, 2, 1],
            vec![bias_mask(), hidden_mask(), hidden_mask(), output_mask()],
            4,
            vec![(1, 3), (2, 4), (0, 3)],
        )
        .unwrap();
        let before = topo.row_plans().to_vec();
        topo.rebuild_row_plans();
        assert_eq!(before, topo.row_plans());
    }

    #[test]
    fn insert_then_remove_restores_edge_list() {
        let mut topo = Topology::new(
            vec![1, 2, 1],
            vec![bias_mask(), hidden_mask(), output_mask()],
            4,
            vec![(1, 3), (2, 3)],
        )
        .unwrap();
        let before = topo.edges().to_vec();
        let idx = topo.insert_edge_sorted(1, 3);
        assert_eq!(topo.remove_edge(idx), (1, 3));
        assert_eq!(topo.edges(), before.as_slice());
    }
}
