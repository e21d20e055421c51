//! # Bring-up planning
//!
//! Turns a finalized [`Topology`] into an ordered list of operations:
//!
//! 1. `deps`: build the layer dependency graph (lower -> upper)
//! 2. `order`: topologically sort it (Kahn), failing on cycles
//! 3. `neighbors`: for each layer, connect members sharing a lower unit
//! 4. `enrollment`: spanning-tree enrollment plus optional full-mesh flows
//! 5. this module: concatenate per-layer operations in activation order
//!
//! The planner is a pure function of its input. Ties are always broken by
//! name, so planning the same topology twice yields the same operations.

pub mod deps;
pub mod enrollment;
pub mod neighbors;
pub mod order;

use crate::config::PlanOptions;
use crate::topology::{LayerId, Topology, UnitId};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

pub use deps::DependencyGraph;
pub use enrollment::{plan_layer, LayerPlan, Operation, OperationKind};
pub use neighbors::{NeighborEdge, NeighborGraph};
pub use order::activation_order;

/// Fatal planning errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error(
        "The specified DIFs topology has one or more circular dependencies, \
         involving the following DIFs: {}\nDIFs dependency graph: {}",
        .implicated.join(", "),
        format_graph(.graph)
    )]
    CyclicDependency {
        /// Every unit left with unsatisfied dependencies, sorted by name
        implicated: Vec<String>,
        /// Dependency adjacency of those units (unit -> dependents)
        graph: BTreeMap<String, Vec<String>>,
    },
    #[error("DIF {layer} is not connected, these nodes cannot enroll: {}", .unenrolled.join(", "))]
    DisconnectedLayer {
        layer: String,
        unenrolled: Vec<String>,
    },
}

fn format_graph(graph: &BTreeMap<String, Vec<String>>) -> String {
    let entries: Vec<String> = graph
        .iter()
        .map(|(unit, deps)| format!("{} -> [{}]", unit, deps.join(", ")))
        .collect();
    format!("{{{}}}", entries.join("; "))
}

/// The output of one planning run
#[derive(Debug, Clone)]
pub struct Plan {
    /// Every segment and layer, dependencies first
    pub order: Vec<UnitId>,
    /// Per-layer plans, in activation order
    pub layers: Vec<LayerPlan>,
}

impl Plan {
    /// All operations, layer by layer in activation order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.layers.iter().flat_map(|p| p.operations())
    }

    pub fn operation_count(&self) -> usize {
        self.operations().count()
    }

    pub fn layer_plan(&self, layer: LayerId) -> Option<&LayerPlan> {
        self.layers.iter().find(|p| p.layer == layer)
    }

    /// Name-based view of the plan, suitable for serialization
    pub fn summary(&self, topology: &Topology) -> PlanSummary {
        PlanSummary {
            order: self
                .order
                .iter()
                .map(|&u| topology.unit_name(u).to_string())
                .collect(),
            operations: self
                .operations()
                .map(|op| OperationRecord {
                    kind: op.kind,
                    layer: topology.layer(op.layer).name.clone(),
                    enrollee: topology.node_name(op.enrollee).to_string(),
                    enroller: topology.node_name(op.enroller).to_string(),
                    lower: topology.unit_name(op.lower).to_string(),
                })
                .collect(),
            unenrolled: self
                .layers
                .iter()
                .filter(|p| !p.is_connected())
                .map(|p| {
                    (
                        topology.layer(p.layer).name.clone(),
                        p.unenrolled
                            .iter()
                            .map(|&n| topology.node_name(n).to_string())
                            .collect(),
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub layer: String,
    pub enrollee: String,
    pub enroller: String,
    pub lower: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub order: Vec<String>,
    pub operations: Vec<OperationRecord>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unenrolled: BTreeMap<String, Vec<String>>,
}

/// Plan the bring-up of a whole topology
pub fn plan(topology: &Topology, options: &PlanOptions) -> Result<Plan, PlanError> {
    let graph = DependencyGraph::build(topology);
    let order = activation_order(&graph, topology)?;

    let mut layers = Vec::new();
    for layer_id in order.iter().filter_map(UnitId::as_layer) {
        let name = &topology.layer(layer_id).name;
        let neighbors = NeighborGraph::build(topology, layer_id);
        let layer_plan = plan_layer(&neighbors, options.strategy);

        if !layer_plan.is_connected() {
            let unenrolled: Vec<String> = layer_plan
                .unenrolled
                .iter()
                .map(|&n| topology.node_name(n).to_string())
                .collect();
            if options.strict_connectivity {
                return Err(PlanError::DisconnectedLayer {
                    layer: name.clone(),
                    unenrolled,
                });
            }
            warn!(
                "DIF {} is not connected, these nodes will not enroll: {}",
                name,
                unenrolled.join(", ")
            );
        }

        for op in layer_plan.operations() {
            info!("{}", op.describe(topology));
        }
        layers.push(layer_plan);
    }

    Ok(Plan { order, layers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnrollmentStrategy;
    use crate::config_loader::{build_topology, parse_conf};

    const TWO_LEVELS: &str = "\
eth b1 0Mbps m1 m2
eth b2 0Mbps m2 m3
dif n m1 b1
dif n m2 b1 b2
dif n m3 b2
dif top m1 n
dif top m3 n
";

    #[test]
    fn test_operations_follow_activation_order() {
        let topology = build_topology(&parse_conf(TWO_LEVELS)).unwrap();
        let plan = plan(&topology, &PlanOptions::default()).unwrap();
        let summary = plan.summary(&topology);

        assert_eq!(summary.order, vec!["b1", "b2", "n", "top"]);
        let layers: Vec<&str> = summary.operations.iter().map(|o| o.layer.as_str()).collect();
        assert_eq!(layers, vec!["n", "n", "top"]);
        assert_eq!(summary.operations[2].enrollee, "m3");
        assert_eq!(summary.operations[2].enroller, "m1");
        assert_eq!(summary.operations[2].lower, "n");
        assert!(summary.unenrolled.is_empty());
    }

    #[test]
    fn test_strict_connectivity() {
        let conf = "eth b1 0Mbps m1 m2\neth b2 0Mbps m3\ndif n m1 b1\ndif n m2 b1\ndif n m3 b2\n";
        let topology = build_topology(&parse_conf(conf)).unwrap();

        let lenient = plan(&topology, &PlanOptions::default()).unwrap();
        assert_eq!(lenient.operation_count(), 1);
        assert_eq!(lenient.summary(&topology).unenrolled["n"], vec!["m3"]);

        let strict = PlanOptions {
            strict_connectivity: true,
            ..PlanOptions::default()
        };
        let err = plan(&topology, &strict).unwrap_err();
        assert_eq!(
            err,
            PlanError::DisconnectedLayer {
                layer: "n".to_string(),
                unenrolled: vec!["m3".to_string()],
            }
        );
    }

    #[test]
    fn test_cycle_error_message_names_units() {
        let topology = build_topology(&parse_conf("dif x m1 y\ndif y m1 x\n")).unwrap();
        let err = plan(&topology, &PlanOptions::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("involving the following DIFs: x, y"));
        assert!(message.contains("x -> [y]"));
        assert!(message.contains("y -> [x]"));
    }

    #[test]
    fn test_summary_serializes() {
        let topology = build_topology(&parse_conf(TWO_LEVELS)).unwrap();
        let options = PlanOptions {
            strategy: EnrollmentStrategy::FullMesh,
            ..PlanOptions::default()
        };
        let summary = plan(&topology, &options).unwrap().summary(&topology);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["operations"][0]["kind"], "enroll");
        assert!(json.get("unenrolled").is_none());
    }
}
