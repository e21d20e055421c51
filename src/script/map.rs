//! `demo.map`: the SSH port forwarded to each node.

use crate::config::ScriptOptions;
use crate::topology::Topology;

pub fn render_map(topology: &Topology, options: &ScriptOptions) -> String {
    let mut out = String::new();
    for (_, node) in topology.nodes() {
        out.push_str(&format!("{} {}\n", node.name, options.base_port as u32 + node.id));
    }
    out
}
