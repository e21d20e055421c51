//! Per-layer neighbor graph.
//!
//! Members of a layer that declare the same lower unit form that unit's
//! "neighset", and every neighset is a complete subgraph. Pairs sharing
//! several lower units get one labeled edge per shared unit.

use crate::topology::{LayerId, NodeId, Topology, UnitId};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet};

/// An undirected adjacency inside a layer, realized through `lower`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NeighborEdge {
    pub a: NodeId,
    pub b: NodeId,
    pub lower: UnitId,
}

#[derive(Debug, Clone)]
pub struct NeighborGraph {
    layer: LayerId,
    /// One edge per shared lower, inserted sorted by (a, b, lower name)
    graph: UnGraph<NodeId, UnitId>,
    index: BTreeMap<NodeId, NodeIndex>,
}

impl NeighborGraph {
    pub fn build(topology: &Topology, layer_id: LayerId) -> Self {
        let layer = topology.layer(layer_id);

        let mut graph = UnGraph::<NodeId, UnitId>::default();
        let mut index = BTreeMap::new();
        let mut neighsets: BTreeMap<UnitId, BTreeSet<NodeId>> = BTreeMap::new();
        for (&member, lowers) in &layer.members {
            index.insert(member, graph.add_node(member));
            for &lower in lowers {
                neighsets.entry(lower).or_default().insert(member);
            }
        }

        let mut edges: Vec<NeighborEdge> = Vec::new();
        for (&lower, neighset) in &neighsets {
            for &a in neighset {
                edges.extend(neighset.range(a..).skip(1).map(|&b| NeighborEdge { a, b, lower }));
            }
        }
        // NodeId order is name order
        edges.sort_by(|x, y| {
            (x.a, x.b)
                .cmp(&(y.a, y.b))
                .then_with(|| topology.unit_name(x.lower).cmp(topology.unit_name(y.lower)))
        });
        for edge in edges {
            graph.add_edge(index[&edge.a], index[&edge.b], edge.lower);
        }

        Self { layer: layer_id, graph, index }
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Traversal root: the member with the smallest name
    pub fn root(&self) -> Option<NodeId> {
        self.index.keys().next().copied()
    }

    pub fn members(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.index.keys().copied()
    }

    pub fn member_count(&self) -> usize {
        self.graph.node_count()
    }

    /// (neighbor, lower) pairs of `node`, by neighbor name then lower name
    pub fn neighbors(&self, node: NodeId) -> Vec<(NodeId, UnitId)> {
        let Some(&idx) = self.index.get(&node) else {
            return Vec::new();
        };
        let mut found: Vec<_> = self
            .graph
            .edges(idx)
            .map(|e| {
                let other = if e.source() == idx { e.target() } else { e.source() };
                (self.graph[other], e.id(), *e.weight())
            })
            .collect();
        // Edge ids follow insertion order, so they break ties by lower name
        found.sort_by_key(|&(other, id, _)| (other, id));
        found.into_iter().map(|(other, _, lower)| (other, lower)).collect()
    }

    /// Every labeled edge once, with `a < b`
    pub fn edges(&self) -> impl Iterator<Item = NeighborEdge> + '_ {
        self.graph.edge_references().map(|e| NeighborEdge {
            a: self.graph[e.source()],
            b: self.graph[e.target()],
            lower: *e.weight(),
        })
    }

    /// Number of unordered member pairs sharing at least one lower unit
    pub fn distinct_pairs(&self) -> usize {
        self.edges()
            .map(|e| (e.a, e.b))
            .collect::<BTreeSet<_>>()
            .len()
    }
}
