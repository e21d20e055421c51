//! `down.sh` generation: stop the guests, then remove taps and bridges.

use crate::topology::Topology;

const KILL_QEMU: &str = "\
kill_qemu() {
   PIDFILE=$1
   PID=$(cat $PIDFILE)
   if [ -n $PID ]; then
       kill $PID
       while [ -n \"$(ps -p $PID -o comm=)\" ]; do
           sleep 1
       done
   fi

   rm $PIDFILE
}

";

pub fn render_down(topology: &Topology) -> String {
    let mut out = String::from("#!/bin/bash\n\nset -x\n\n");
    out.push_str(KILL_QEMU);

    for (_, node) in topology.nodes() {
        out.push_str(&format!("kill_qemu rina-{}.pid\n", node.id));
    }
    out.push('\n');

    for (_, node) in topology.nodes() {
        for port in &node.ports {
            out.push_str(&format!(
                "sudo brctl delif {br} {tap}\n\
                 sudo ip link set {tap} down\n\
                 sudo ip tuntap del mode tap name {tap}\n\n",
                br = topology.segment(port.segment).name,
                tap = port.tap
            ));
        }
    }

    let mut segments: Vec<&str> = topology.segments().map(|(_, s)| s.name.as_str()).collect();
    segments.sort_unstable();
    for br in segments {
        out.push_str(&format!("sudo ip link set {br} down\nsudo brctl delbr {br}\n\n", br = br));
    }

    out
}
