//! Enrollment and lower-flow-allocation planning for one layer.

use super::neighbors::NeighborGraph;
use crate::config::EnrollmentStrategy;
use crate::topology::{LayerId, NodeId, Topology, UnitId};
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// What a planned operation does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// The enrollee joins the layer through the enroller
    Enroll,
    /// Two already enrolled members open an additional direct flow
    LowerFlowAlloc,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Enroll => f.write_str("enroll"),
            OperationKind::LowerFlowAlloc => f.write_str("lower-flow-alloc"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub layer: LayerId,
    pub enrollee: NodeId,
    pub enroller: NodeId,
    pub lower: UnitId,
}

impl Operation {
    /// Human readable form, as logged while planning
    pub fn describe(&self, topology: &Topology) -> String {
        format!(
            "{} {} to DIF {} against neighbor {}, through lower DIF {}",
            self.kind,
            topology.node_name(self.enrollee),
            topology.layer(self.layer).name,
            topology.node_name(self.enroller),
            topology.unit_name(self.lower)
        )
    }
}

/// Operations planned for one layer
#[derive(Debug, Clone)]
pub struct LayerPlan {
    pub layer: LayerId,
    /// Spanning tree, in traversal order
    pub enrollments: Vec<Operation>,
    /// Residual edges, only under the full-mesh strategy
    pub lower_flow_allocs: Vec<Operation>,
    /// Members not reachable from the root, in name order
    pub unenrolled: Vec<NodeId>,
}

impl LayerPlan {
    pub fn is_connected(&self) -> bool {
        self.unenrolled.is_empty()
    }

    /// Enrollments followed by lower flow allocations
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.enrollments.iter().chain(self.lower_flow_allocs.iter())
    }
}

/// Result of simulating enrollment over one layer
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    /// Spanning tree of the root's component, in traversal order
    pub enrollments: Vec<Operation>,
    /// Unordered member pairs connected by a planned operation
    pub covered: BTreeSet<(NodeId, NodeId)>,
    pub enrolled: BTreeSet<NodeId>,
}

fn pair(x: NodeId, y: NodeId) -> (NodeId, NodeId) {
    if x < y { (x, y) } else { (y, x) }
}

/// Simulate enrollment by breadth-first traversal from the graph root
pub fn plan_enrollments(graph: &NeighborGraph) -> Traversal {
    let mut traversal = Traversal::default();
    let Some(root) = graph.root() else {
        return traversal;
    };

    traversal.enrolled.insert(root);
    let mut frontier = VecDeque::from([root]);
    while let Some(cur) = frontier.pop_front() {
        for (other, lower) in graph.neighbors(cur) {
            if traversal.enrolled.insert(other) {
                traversal.covered.insert(pair(other, cur));
                traversal.enrollments.push(Operation {
                    kind: OperationKind::Enroll,
                    layer: graph.layer(),
                    enrollee: other,
                    enroller: cur,
                    lower,
                });
                frontier.push_back(other);
            }
        }
    }
    traversal
}

/// One lower flow per enrolled neighbor pair not covered by the spanning tree
///
/// The member with the smaller name is the enrollee. When a pair shares
/// several lower units, the first one in name order is used.
pub fn plan_lower_flow_allocs(graph: &NeighborGraph, traversal: &mut Traversal) -> Vec<Operation> {
    let mut allocs = Vec::new();
    for edge in graph.edges() {
        if !traversal.enrolled.contains(&edge.a) || !traversal.enrolled.contains(&edge.b) {
            continue;
        }
        if traversal.covered.insert(pair(edge.a, edge.b)) {
            allocs.push(Operation {
                kind: OperationKind::LowerFlowAlloc,
                layer: graph.layer(),
                enrollee: edge.a,
                enroller: edge.b,
                lower: edge.lower,
            });
        }
    }
    allocs
}

/// Plan a whole layer under the given strategy
pub fn plan_layer(graph: &NeighborGraph, strategy: EnrollmentStrategy) -> LayerPlan {
    let mut traversal = plan_enrollments(graph);
    let lower_flow_allocs = match strategy {
        EnrollmentStrategy::Minimal => Vec::new(),
        EnrollmentStrategy::FullMesh => plan_lower_flow_allocs(graph, &mut traversal),
    };
    let unenrolled = graph
        .members()
        .filter(|m| !traversal.enrolled.contains(m))
        .collect();
    LayerPlan {
        layer: graph.layer(),
        enrollments: traversal.enrollments,
        lower_flow_allocs,
        unenrolled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_loader::{build_topology, parse_conf};

    fn plan_for(conf: &str, layer: &str, strategy: EnrollmentStrategy) -> (Topology, NeighborGraph, LayerPlan) {
        let topology = build_topology(&parse_conf(conf)).unwrap();
        let id = topology.unit_id(layer).unwrap().as_layer().unwrap();
        let graph = NeighborGraph::build(&topology, id);
        let plan = plan_layer(&graph, strategy);
        (topology, graph, plan)
    }

    fn names(topology: &Topology, ops: &[Operation]) -> Vec<(String, String, String)> {
        ops.iter()
            .map(|op| {
                (
                    topology.node_name(op.enrollee).to_string(),
                    topology.node_name(op.enroller).to_string(),
                    topology.unit_name(op.lower).to_string(),
                )
            })
            .collect()
    }

    /// Check that (enrollee, enroller) pairs form a tree over `expected` members
    fn assert_spanning_tree(ops: &[Operation], expected: usize) {
        assert_eq!(ops.len(), expected - 1);
        let mut joined: BTreeSet<NodeId> = BTreeSet::new();
        if let Some(first) = ops.first() {
            joined.insert(first.enroller);
        }
        for op in ops {
            // The enroller is already in, the enrollee is new
            assert!(joined.contains(&op.enroller));
            assert!(joined.insert(op.enrollee));
        }
        assert_eq!(joined.len(), expected);
    }

    #[test]
    fn test_path_enrollment() {
        let (topology, _, plan) = plan_for(
            "eth b1 0Mbps m1 m2\n\
             eth b2 0Mbps m2 m3\n\
             dif n m1 b1\n\
             dif n m2 b1 b2\n\
             dif n m3 b2\n",
            "n",
            EnrollmentStrategy::Minimal,
        );
        assert_eq!(
            names(&topology, &plan.enrollments),
            vec![
                ("m2".to_string(), "m1".to_string(), "b1".to_string()),
                ("m3".to_string(), "m2".to_string(), "b2".to_string()),
            ]
        );
        assert!(plan.lower_flow_allocs.is_empty());
        assert!(plan.is_connected());
        assert_spanning_tree(&plan.enrollments, 3);
    }

    #[test]
    fn test_full_mesh_triangle() {
        let (topology, graph, plan) = plan_for(
            "eth b1 0Mbps m1 m2 m3\n\
             dif n m1 b1\n\
             dif n m2 b1\n\
             dif n m3 b1\n",
            "n",
            EnrollmentStrategy::FullMesh,
        );
        assert_spanning_tree(&plan.enrollments, 3);
        assert_eq!(
            names(&topology, &plan.lower_flow_allocs),
            vec![("m2".to_string(), "m3".to_string(), "b1".to_string())]
        );
        assert_eq!(plan.lower_flow_allocs[0].kind, OperationKind::LowerFlowAlloc);
        assert_eq!(
            plan.enrollments.len() + plan.lower_flow_allocs.len(),
            graph.distinct_pairs()
        );
    }

    #[test]
    fn test_full_mesh_covers_each_pair_once() {
        // m1-m2 share both b1 and b2
        let (_, graph, plan) = plan_for(
            "eth b1 0Mbps m1 m2 m3 m4\n\
             eth b2 0Mbps m1 m2\n\
             eth b3 0Mbps m4 m5\n\
             dif n m1 b1 b2\n\
             dif n m2 b2 b1\n\
             dif n m3 b1\n\
             dif n m4 b1 b3\n\
             dif n m5 b3\n",
            "n",
            EnrollmentStrategy::FullMesh,
        );
        assert_spanning_tree(&plan.enrollments, 5);
        let mut pairs: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
        for op in plan.operations() {
            assert!(pairs.insert(pair(op.enrollee, op.enroller)), "pair planned twice");
        }
        assert_eq!(pairs.len(), graph.distinct_pairs());
        assert_eq!(pairs.len(), 7);
    }

    #[test]
    fn test_residual_flow_uses_first_lower_by_name() {
        // b2 is declared first, so its id sorts before b1
        let (topology, _, plan) = plan_for(
            "eth b2 0Mbps m2 m3\n\
             eth b1 0Mbps m1 m2 m3\n\
             dif n m1 b1\n\
             dif n m2 b2 b1\n\
             dif n m3 b2 b1\n",
            "n",
            EnrollmentStrategy::FullMesh,
        );
        assert_eq!(
            names(&topology, &plan.enrollments),
            vec![
                ("m2".to_string(), "m1".to_string(), "b1".to_string()),
                ("m3".to_string(), "m1".to_string(), "b1".to_string()),
            ]
        );
        assert_eq!(
            names(&topology, &plan.lower_flow_allocs),
            vec![("m2".to_string(), "m3".to_string(), "b1".to_string())]
        );
    }

    #[test]
    fn test_disconnected_layer_reports_unenrolled() {
        let (topology, _, plan) = plan_for(
            "eth b1 0Mbps m1 m2\n\
             eth b2 0Mbps m3 m4\n\
             dif n m1 b1\n\
             dif n m2 b1\n\
             dif n m3 b2\n\
             dif n m4 b2\n",
            "n",
            EnrollmentStrategy::FullMesh,
        );
        assert_eq!(plan.enrollments.len(), 1);
        assert!(!plan.is_connected());
        let left: Vec<&str> = plan.unenrolled.iter().map(|&n| topology.node_name(n)).collect();
        assert_eq!(left, vec!["m3", "m4"]);
        // No lower flows between members that never enrolled
        assert!(plan.lower_flow_allocs.is_empty());
    }

    #[test]
    fn test_single_member_layer() {
        let (_, _, plan) = plan_for("eth b1 0Mbps m1\ndif n m1 b1\n", "n", EnrollmentStrategy::Minimal);
        assert!(plan.enrollments.is_empty());
        assert!(plan.is_connected());
    }

    #[test]
    fn test_describe() {
        let (topology, _, plan) = plan_for(
            "eth b1 0Mbps m1 m2\ndif n m1 b1\ndif n m2 b1\n",
            "n",
            EnrollmentStrategy::Minimal,
        );
        assert_eq!(
            plan.enrollments[0].describe(&topology),
            "enroll m2 to DIF n against neighbor m1, through lower DIF b1"
        );
    }
}
