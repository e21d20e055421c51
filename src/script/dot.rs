//! Graphviz rendering of the per-layer neighbor graphs.

use crate::plan::NeighborGraph;
use crate::topology::Topology;

const COLORS: [(&str, &str); 5] = [
    ("red", "black"),
    ("green", "black"),
    ("blue", "white"),
    ("orange", "black"),
    ("yellow", "black"),
];

/// One undirected graph; each layer's members are colored alike and each
/// edge is labeled with the lower unit it goes through
pub fn render_dot(topology: &Topology) -> String {
    let mut out = String::from("graph difs {\n");

    for (i, (layer_id, layer)) in topology.layers().enumerate() {
        let (fill, font) = COLORS[i % COLORS.len()];
        let graph = NeighborGraph::build(topology, layer_id);

        for member in graph.members() {
            let name = topology.node_name(member);
            out.push_str(&format!(
                "    \"{dif}{vm}\" [label=\"{vm}({dif})\", style=filled, fillcolor={fill}, fontcolor={font}];\n",
                dif = layer.name,
                vm = name,
                fill = fill,
                font = font
            ));
        }
        for edge in graph.edges() {
            out.push_str(&format!(
                "    \"{dif}{a}\" -- \"{dif}{b}\" [label=\"{lower}\"];\n",
                dif = layer.name,
                a = topology.node_name(edge.a),
                b = topology.node_name(edge.b),
                lower = topology.unit_name(edge.lower)
            ));
        }
    }

    out.push_str("}\n");
    out
}
