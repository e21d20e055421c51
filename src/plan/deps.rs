//! Layer dependency graph.
//!
//! An edge `lower -> upper` means `upper` cannot be activated before
//! `lower`. Base segments only ever appear as edge sources.

use crate::topology::{Topology, UnitId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction::{Incoming, Outgoing};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<UnitId, ()>,
    index: BTreeMap<UnitId, NodeIndex>,
}

impl DependencyGraph {
    /// Derive the graph from every layer and base segment of the topology
    pub fn build(topology: &Topology) -> Self {
        let mut graph: DiGraph<UnitId, ()> = DiGraph::new();
        let mut index = BTreeMap::new();
        for unit in topology.units() {
            index.insert(unit, graph.add_node(unit));
        }

        for (layer_id, layer) in topology.layers() {
            let upper = index[&UnitId::Layer(layer_id)];
            for lower in layer.dependencies() {
                // A lower shared by several members is a single edge
                graph.update_edge(index[&lower], upper, ());
            }
        }

        Self { graph, index }
    }

    pub fn dependents(&self, unit: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        self.index
            .get(&unit)
            .into_iter()
            .flat_map(move |&idx| self.graph.neighbors_directed(idx, Outgoing))
            .map(move |n| self.graph[n])
    }

    /// Number of distinct lower units of `unit`
    pub fn in_degree(&self, unit: UnitId) -> usize {
        self.index
            .get(&unit)
            .map_or(0, |&idx| self.graph.neighbors_directed(idx, Incoming).count())
    }

    /// Every unit, segments first, in topology order
    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.graph.node_weights().copied()
    }
}
