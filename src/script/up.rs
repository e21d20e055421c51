//! `up.sh` generation.
//!
//! The script creates host bridges and taps, boots one QEMU guest per node,
//! configures IPCPs inside each guest over SSH and finally replays the
//! planned operations one at a time. Every remote step is retried until it
//! succeeds.

use crate::config::ScriptOptions;
use crate::ip::Ipv4Prefix;
use crate::plan::Plan;
use crate::topology::{Node, NodeId, SegmentId, SegmentKind, Topology, UnitId};
use std::collections::BTreeMap;

/// Host name mapping of one udp4 member
#[derive(Debug, Clone, PartialEq)]
pub struct DnsMapping {
    pub ip: Ipv4Prefix,
    pub name: String,
}

/// Names of the normal IPCPs reachable through each udp4 shim
///
/// A member gets a mapping once some layer uses the shim as a lower unit on
/// that member. When several layers do, the last one in activation order wins.
pub fn dns_mappings(topology: &Topology, plan: &Plan) -> BTreeMap<SegmentId, BTreeMap<NodeId, DnsMapping>> {
    let mut mappings: BTreeMap<SegmentId, BTreeMap<NodeId, DnsMapping>> = BTreeMap::new();

    for layer_id in plan.order.iter().filter_map(UnitId::as_layer) {
        let layer = topology.layer(layer_id);
        for (&node_id, lowers) in &layer.members {
            for lower in lowers {
                let UnitId::Segment(sid) = *lower else { continue };
                let SegmentKind::Udp4 { addresses } = &topology.segment(sid).kind else {
                    continue;
                };
                let Some(&ip) = addresses.get(&node_id) else { continue };
                let id = topology.node(node_id).id;
                mappings.entry(sid).or_default().insert(
                    node_id,
                    DnsMapping {
                        ip,
                        name: format!("{}.{}.IPCP-{}--", layer.name, id, id),
                    },
                );
            }
        }
    }

    mappings
}

fn ssh_port(options: &ScriptOptions, node: &Node) -> u32 {
    options.base_port as u32 + node.id
}

/// Wrap `body` in an SSH session to `node`, retried until it exits with 0
fn ssh_retry(out: &mut String, options: &ScriptOptions, node: &Node, body: &str) {
    out.push_str(&format!(
        "DONE=255\n\
         while [ $DONE != \"0\" ]; do\n   \
         ssh {opts} -p {port} {user}@localhost << 'ENDSSH'\n\
         set -x\n\
         SUDO=\n\
         {body}\
         sleep 1\n\
         true\n\
         ENDSSH\n   \
         DONE=$?\n   \
         if [ $DONE != \"0\" ]; then\n       \
         sleep 1\n   \
         fi\n\
         done\n\n",
        opts = options.ssh_opts(),
        port = ssh_port(options, node),
        user = options.username,
        body = body,
    ));
}

fn host_network(out: &mut String, topology: &Topology) {
    let mut segments: Vec<_> = topology.segments().map(|(_, s)| s).collect();
    segments.sort_by(|a, b| a.name.cmp(&b.name));
    for segment in &segments {
        out.push_str(&format!(
            "sudo brctl addbr {br}\nsudo ip link set {br} up\n\n",
            br = segment.name
        ));
    }

    let mut links: Vec<_> = topology
        .nodes()
        .flat_map(|(_, node)| node.ports.iter().map(move |port| (node, port)))
        .map(|(node, port)| (topology.segment(port.segment), node, port))
        .collect();
    links.sort_by(|a, b| (&a.0.name, &a.1.name).cmp(&(&b.0.name, &b.1.name)));

    for (segment, _, port) in links {
        out.push_str(&format!(
            "sudo ip tuntap add mode tap name {tap}\n\
             sudo ip link set {tap} up\n\
             sudo brctl addif {br} {tap}\n\n",
            tap = port.tap,
            br = segment.name
        ));
        if let SegmentKind::Eth { bandwidth } = &segment.kind {
            if bandwidth.is_limited() {
                out.push_str(&format!(
                    "sudo tc qdisc add dev {tap} handle 1: root htb default 11\n\
                     sudo tc class add dev {tap} parent 1: classid 1:1 htb rate 10gbit\n\
                     sudo tc class add dev {tap} parent 1:1 classid 1:11 htb rate {rate}\n",
                    tap = port.tap,
                    rate = bandwidth.tc_rate()
                ));
            }
        }
    }
}

fn boot_nodes(out: &mut String, topology: &Topology, options: &ScriptOptions) {
    let vhost = if options.vhost { ",vhost=on" } else { "" };
    let mut budget = options.boot_batch_size;

    for (_, node) in topology.nodes() {
        out.push_str(&format!(
            "qemu-system-x86_64 \
             -kernel {img}/bzImage \
             -append \"console=ttyS0\" \
             -initrd {img}/rootfs.cpio \
             -nographic \
             -display none \
             --enable-kvm \
             -smp 1 \
             -m {mem}M \
             -device {fe},mac={mac},netdev=mgmt \
             -netdev user,id=mgmt,hostfwd=tcp::{port}-:22 \
             -vga std \
             -pidfile rina-{id}.pid ",
            img = options.image_dir,
            mem = options.memory,
            fe = options.frontend,
            mac = node.mgmt_mac(),
            port = ssh_port(options, node),
            id = node.id,
        ));
        for port in &node.ports {
            out.push_str(&format!(
                "-device {fe},mac={mac},netdev=data{idx} \
                 -netdev tap,ifname={tap},id=data{idx},script=no,downscript=no{vhost} ",
                fe = options.frontend,
                mac = node.port_mac(port.idx),
                idx = port.idx,
                tap = port.tap,
                vhost = vhost,
            ));
        }
        out.push_str("&\n");

        budget = budget.saturating_sub(1);
        if budget == 0 {
            out.push_str(&format!("sleep {}\n", options.wait_for_boot));
            budget = options.boot_batch_size;
        }
    }
}

fn node_setup(
    topology: &Topology,
    plan: &Plan,
    options: &ScriptOptions,
    dns: &BTreeMap<SegmentId, BTreeMap<NodeId, DnsMapping>>,
    node_id: NodeId,
) -> String {
    let node = topology.node(node_id);
    let mut body = String::new();

    body.push_str(&format!(
        "$SUDO hostname {name}\n\n\n\
         $SUDO modprobe rlite verbosity={verbidx}\n\
         $SUDO modprobe rlite-shim-eth\n\
         $SUDO modprobe rlite-shim-udp4\n\
         $SUDO modprobe rlite-normal\n\
         $SUDO chmod a+rwx /dev/rlite\n\
         $SUDO chmod a+rwx /dev/rlite-io\n\
         $SUDO mkdir -p /var/rlite\n\
         $SUDO chmod -R a+rw /var/rlite\n\
         \n\
         $SUDO rlite-uipcps -v {verb} &> uipcp.log &\n",
        name = node.name,
        verbidx = options.verbosity.index(),
        verb = options.verbosity,
    ));

    // Shim IPCPs, one per port
    for port in &node.ports {
        let segment = topology.segment(port.segment);
        body.push_str(&format!(
            "PORT=$(mac2ifname {mac})\n\
             $SUDO ip link set $PORT up\n\
             $SUDO rlite-ctl ipcp-create {shim}.{id}.IPCP/{idx}// shim-{ty} {shim}.DIF\n",
            mac = node.port_mac(port.idx),
            shim = segment.name,
            id = node.id,
            idx = port.idx,
            ty = segment.kind.shim_type(),
        ));
        match (&segment.kind, port.ip) {
            (SegmentKind::Eth { .. }, _) => {
                body.push_str(&format!(
                    "$SUDO rlite-ctl ipcp-config {}.{}.IPCP/{}// netdev $PORT\n",
                    segment.name, node.id, port.idx
                ));
            }
            (SegmentKind::Udp4 { .. }, Some(ip)) => {
                body.push_str(&format!("$SUDO ip addr add {} dev $PORT\n", ip));
            }
            (SegmentKind::Udp4 { .. }, None) => {}
        }
    }

    // Normal IPCPs, one per layer the node belongs to
    let member_layers: Vec<_> = plan
        .order
        .iter()
        .filter_map(UnitId::as_layer)
        .map(|id| topology.layer(id))
        .filter(|layer| layer.members.contains_key(&node_id))
        .collect();

    for layer in &member_layers {
        body.push_str(&format!(
            "$SUDO rlite-ctl ipcp-create {dif}.{id}.IPCP/{id}// normal {dif}.DIF\n\
             $SUDO rlite-ctl ipcp-config {dif}.{id}.IPCP/{id}// address {id}\n",
            dif = layer.name,
            id = node.id,
        ));
    }

    for entries in dns.values() {
        for mapping in entries.values() {
            body.push_str(&format!("echo \"{} {}\" >> /etc/hosts\n", mapping.ip.addr(), mapping.name));
        }
    }

    // Registrations follow the activation order
    for layer in &member_layers {
        for &lower in &layer.members[&node_id] {
            body.push_str(&format!(
                "$SUDO rlite-ctl ipcp-register {lodif}.DIF {dif}.{id}.IPCP/{id}//\n",
                lodif = topology.unit_name(lower),
                dif = layer.name,
                id = node.id,
            ));
        }
    }

    body.push('\n');
    body
}

/// Render the complete bring-up script
pub fn render_up(topology: &Topology, plan: &Plan, options: &ScriptOptions) -> String {
    let mut out = String::from("#!/bin/bash\n\nset -x\n\n");

    host_network(&mut out, topology);
    boot_nodes(&mut out, topology, options);

    let dns = dns_mappings(topology, plan);
    for (node_id, node) in topology.nodes() {
        let body = node_setup(topology, plan, options, &dns, node_id);
        ssh_retry(&mut out, options, node, &body);
    }

    for op in plan.operations() {
        let enrollee = topology.node(op.enrollee);
        let enroller = topology.node(op.enroller);
        let dif = &topology.layer(op.layer).name;
        let body = format!(
            "$SUDO rlite-ctl ipcp-{oper} {dif}.DIF {dif}.{id}.IPCP/{id}// {dif}.{pvid}.IPCP/{pvid}// {ldif}.DIF\n",
            oper = op.kind,
            dif = dif,
            id = enrollee.id,
            pvid = enroller.id,
            ldif = topology.unit_name(op.lower),
        );
        out.push_str("sleep 1\n");
        ssh_retry(&mut out, options, enrollee, &body);
    }

    out
}
