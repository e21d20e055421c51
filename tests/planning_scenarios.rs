#[cfg(test)]
mod planning_scenarios {
    use std::collections::BTreeSet;

    use difsim::config::{EnrollmentStrategy, PlanOptions};
    use difsim::config_loader::{build_topology, parse_conf};
    use difsim::plan::{plan, DependencyGraph, NeighborGraph, OperationKind, PlanError};
    use difsim::topology::{ring_conf, Topology, UnitId};

    fn topology(conf: &str) -> Topology {
        build_topology(&parse_conf(conf)).unwrap()
    }

    fn options(strategy: EnrollmentStrategy) -> PlanOptions {
        PlanOptions {
            strategy,
            ..PlanOptions::default()
        }
    }

    const SCENARIO_A: &str = "\
eth b1 0Mbps m1 m2
eth b2 0Mbps m2 m3
dif n m1 b1
dif n m2 b1 b2
dif n m3 b2
";

    /// Two shims and one DIF forming a path m1 - m2 - m3
    #[test]
    fn test_scenario_a_path() {
        let topology = topology(SCENARIO_A);
        let result = plan(&topology, &PlanOptions::default()).unwrap();
        let summary = result.summary(&topology);

        assert_eq!(summary.order.len(), 3);
        assert_eq!(summary.order[2], "n");
        let shims: BTreeSet<&str> = summary.order[..2].iter().map(String::as_str).collect();
        assert_eq!(shims, BTreeSet::from(["b1", "b2"]));

        let n = topology.unit_id("n").and_then(|u| u.as_layer()).unwrap();
        let graph = NeighborGraph::build(&topology, n);
        let edges: Vec<(&str, &str, &str)> = graph
            .edges()
            .map(|e| {
                (
                    topology.node_name(e.a),
                    topology.node_name(e.b),
                    topology.unit_name(e.lower),
                )
            })
            .collect();
        assert_eq!(edges, vec![("m1", "m2", "b1"), ("m2", "m3", "b2")]);

        assert_eq!(summary.operations.len(), 2);
        let pairs: BTreeSet<(String, String)> = summary
            .operations
            .iter()
            .map(|op| {
                assert_eq!(op.kind, OperationKind::Enroll);
                let mut pair = [op.enrollee.clone(), op.enroller.clone()];
                pair.sort();
                (pair[0].clone(), pair[1].clone())
            })
            .collect();
        assert_eq!(
            pairs,
            BTreeSet::from([
                ("m1".to_string(), "m2".to_string()),
                ("m2".to_string(), "m3".to_string()),
            ])
        );
    }

    /// Two DIFs depending on each other
    #[test]
    fn test_scenario_b_cycle() {
        let topology = topology("eth b1 0Mbps m1 m2\ndif x m1 y\ndif x m2 b1\ndif y m1 x\n");
        match plan(&topology, &PlanOptions::default()) {
            Err(PlanError::CyclicDependency { implicated, graph }) => {
                assert_eq!(implicated, vec!["x", "y"]);
                assert_eq!(graph.len(), 2);
            }
            other => panic!("expected a cycle error, got {:?}", other),
        }
    }

    /// Full mesh over three members sharing one shim
    #[test]
    fn test_scenario_c_full_mesh() {
        let topology = topology("eth b1 0Mbps m1 m2 m3\ndif n m1 b1\ndif n m2 b1\ndif n m3 b1\n");
        let result = plan(&topology, &options(EnrollmentStrategy::FullMesh)).unwrap();

        let kinds: Vec<OperationKind> = result.operations().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::Enroll,
                OperationKind::Enroll,
                OperationKind::LowerFlowAlloc
            ]
        );

        let minimal = plan(&topology, &PlanOptions::default()).unwrap();
        assert_eq!(minimal.operation_count(), 2);
    }

    /// Every dependency edge goes forward in the activation order
    #[test]
    fn test_order_respects_every_edge() {
        let conf = "\
eth e1 1Gbps a b c
eth e2 10Mbps c d
udp4 u1 a:10.0.0.1/24 d:10.0.0.4/24
dif low a e1
dif low b e1
dif low c e1 e2
dif low d e2 u1
dif mid a low u1
dif mid d low u1
dif top a mid
dif top b low
dif top d mid
";
        let topology = topology(conf);
        let graph = DependencyGraph::build(&topology);
        let result = plan(&topology, &PlanOptions::default()).unwrap();

        let position = |u: UnitId| result.order.iter().position(|&x| x == u).unwrap();
        assert_eq!(result.order.len(), topology.units().count());
        let unique: BTreeSet<UnitId> = result.order.iter().copied().collect();
        assert_eq!(unique.len(), result.order.len());

        for lower in topology.units() {
            for upper in graph.dependents(lower) {
                assert!(position(lower) < position(upper));
            }
        }
    }

    /// Spanning tree plus residual flows cover each neighbor pair exactly once
    #[test]
    fn test_full_mesh_completeness() {
        let topology = topology(&ring_conf(6));
        let result = plan(&topology, &options(EnrollmentStrategy::FullMesh)).unwrap();
        let n = topology.unit_id("n").and_then(|u| u.as_layer()).unwrap();
        let graph = NeighborGraph::build(&topology, n);
        let layer_plan = result.layer_plan(n).unwrap();

        assert_eq!(layer_plan.enrollments.len(), 5);
        assert_eq!(
            layer_plan.enrollments.len() + layer_plan.lower_flow_allocs.len(),
            graph.distinct_pairs()
        );
        assert_eq!(graph.distinct_pairs(), 6);
    }

    /// Members outside the root's component never enroll
    #[test]
    fn test_disconnected_layer() {
        let conf = "\
eth b1 0Mbps m1 m2
eth b2 0Mbps m3 m4
dif n m1 b1
dif n m2 b1
dif n m3 b2
dif n m4 b2
";
        let topology = topology(conf);
        let result = plan(&topology, &PlanOptions::default()).unwrap();
        let summary = result.summary(&topology);
        assert_eq!(summary.operations.len(), 1);
        assert_eq!(summary.unenrolled["n"], vec!["m3", "m4"]);

        let strict = PlanOptions {
            strict_connectivity: true,
            ..PlanOptions::default()
        };
        assert!(matches!(
            plan(&topology, &strict),
            Err(PlanError::DisconnectedLayer { .. })
        ));
    }

    /// Planning twice gives the same result
    #[test]
    fn test_replanning_is_stable() {
        let topology = topology(&ring_conf(5));
        let opts = options(EnrollmentStrategy::FullMesh);
        let first = plan(&topology, &opts).unwrap().summary(&topology);
        let second = plan(&topology, &opts).unwrap().summary(&topology);
        assert_eq!(first, second);
    }

    /// Enrollments of an upper DIF come after those of its lower DIF
    #[test]
    fn test_stacked_layers_sequence() {
        let conf = "\
eth b1 0Mbps m1 m2
eth b2 0Mbps m2 m3
dif upper m1 lower
dif upper m3 lower
dif lower m1 b1
dif lower m2 b1 b2
dif lower m3 b2
";
        let topology = topology(conf);
        let summary = plan(&topology, &PlanOptions::default()).unwrap().summary(&topology);
        let layers: Vec<&str> = summary.operations.iter().map(|o| o.layer.as_str()).collect();
        assert_eq!(layers, vec!["lower", "lower", "upper"]);
    }
}
