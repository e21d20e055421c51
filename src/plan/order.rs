//! Activation order of layers (Kahn's algorithm).

use super::deps::DependencyGraph;
use super::PlanError;
use crate::topology::{Topology, UnitId};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Compute an activation order containing every segment and layer exactly once
///
/// Units whose dependencies are satisfied at the same time are taken in
/// name order. If some units can never be activated, they are part of (or
/// depend on) a cycle and the whole run fails.
pub fn activation_order(
    graph: &DependencyGraph,
    topology: &Topology,
) -> Result<Vec<UnitId>, PlanError> {
    let mut remaining: BTreeMap<UnitId, usize> =
        graph.units().map(|u| (u, graph.in_degree(u))).collect();

    let mut frontier: BTreeSet<(&str, UnitId)> = remaining
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&u, _)| (topology.unit_name(u), u))
        .collect();

    let mut order = Vec::with_capacity(remaining.len());
    while let Some((name, cur)) = frontier.pop_first() {
        debug!("Activating {}", name);
        order.push(cur);
        for next in graph.dependents(cur) {
            if let Some(count) = remaining.get_mut(&next) {
                *count -= 1;
                if *count == 0 {
                    frontier.insert((topology.unit_name(next), next));
                }
            }
        }
    }

    let mut implicated: Vec<String> = remaining
        .iter()
        .filter(|(_, &count)| count != 0)
        .map(|(&u, _)| topology.unit_name(u).to_string())
        .collect();

    if !implicated.is_empty() {
        implicated.sort();
        return Err(PlanError::CyclicDependency {
            implicated,
            graph: residual_graph(graph, topology, &order),
        });
    }

    Ok(order)
}

/// Dependency adjacency, by name, restricted to units that were not activated
fn residual_graph(
    graph: &DependencyGraph,
    topology: &Topology,
    activated: &[UnitId],
) -> BTreeMap<String, Vec<String>> {
    let activated: BTreeSet<UnitId> = activated.iter().copied().collect();
    graph
        .units()
        .filter(|u| !activated.contains(u))
        .map(|u| {
            let mut deps: Vec<String> = graph
                .dependents(u)
                .map(|d| topology.unit_name(d).to_string())
                .collect();
            deps.sort();
            (topology.unit_name(u).to_string(), deps)
        })
        .collect()
}
