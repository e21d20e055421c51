//! Topology construction from declarations.
//!
//! Declarations are accumulated by name. Conflicting declarations are
//! reported and skipped without aborting the load. [`TopologyBuilder::finish`]
//! then resolves names into the arenas of [`Topology`], numbers nodes and
//! segments and assigns ports.

use super::types::{
    Bandwidth, BaseSegment, Layer, LayerId, Node, NodeId, Port, SegmentId, SegmentKind, Topology,
    UnitId,
};
use crate::config::{ConfigError, Declaration, SourceDeclaration};
use crate::ip::Ipv4Prefix;
use log::{debug, error};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Fatal errors raised while finalizing a topology
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    #[error("node {node} in dif {layer} uses unknown lower dif {lower}")]
    UnknownLower {
        layer: String,
        node: String,
        lower: String,
    },
}

/// A declaration that was skipped, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub origin: usize,
    pub error: ConfigError,
}

#[derive(Debug)]
enum PendingKind {
    Eth(Bandwidth),
    Udp4(BTreeMap<String, Ipv4Prefix>),
}

#[derive(Debug)]
struct PendingSegment {
    name: String,
    kind: PendingKind,
    members: Vec<String>,
}

#[derive(Debug)]
struct PendingLayer {
    name: String,
    members: BTreeMap<String, Vec<String>>,
}

/// Accumulates declarations and produces a [`Topology`]
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    nodes: BTreeSet<String>,
    segments: Vec<PendingSegment>,
    segment_index: HashMap<String, usize>,
    layers: Vec<PendingLayer>,
    layer_index: HashMap<String, usize>,
    rejected: Vec<Rejection>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a topology from a list of declarations in one go
    pub fn from_declarations<'a, I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = &'a SourceDeclaration>,
    {
        let mut builder = Self::new();
        for decl in declarations {
            builder.add(decl);
        }
        builder
    }

    /// Declarations skipped so far
    pub fn rejected(&self) -> &[Rejection] {
        &self.rejected
    }

    /// Add one declaration. Conflicts are logged and recorded, never returned.
    pub fn add(&mut self, decl: &SourceDeclaration) {
        let origin = decl.origin;
        let result = match &decl.declaration {
            Declaration::Eth { name, bandwidth, nodes } => self.add_eth(origin, name, bandwidth, nodes),
            Declaration::Udp4 { name, members } => self.add_udp4(origin, name, members),
            Declaration::Dif { name, node, lowers } => self.add_membership(name, node, lowers),
        };
        if let Err(e) = result {
            self.reject(origin, e);
        }
    }

    fn reject(&mut self, origin: usize, error: ConfigError) {
        error!("Line {}: {}", origin, error);
        self.rejected.push(Rejection { origin, error });
    }

    fn check_segment_name(&self, name: &str) -> Result<(), ConfigError> {
        if self.segment_index.contains_key(name) {
            return Err(ConfigError::DuplicateSegment(name.to_string()));
        }
        if self.layer_index.contains_key(name) {
            return Err(ConfigError::NameClash(name.to_string()));
        }
        Ok(())
    }

    fn push_segment(&mut self, segment: PendingSegment) {
        debug!("Adding shim {} with {} members", segment.name, segment.members.len());
        self.segment_index.insert(segment.name.clone(), self.segments.len());
        self.segments.push(segment);
    }

    fn add_eth(
        &mut self,
        origin: usize,
        name: &str,
        bandwidth: &str,
        nodes: &[String],
    ) -> Result<(), ConfigError> {
        self.check_segment_name(name)?;
        let bandwidth: Bandwidth = bandwidth
            .parse()
            .map_err(|_| ConfigError::InvalidBandwidth(bandwidth.to_string()))?;

        let mut members: Vec<String> = Vec::with_capacity(nodes.len());
        for node in nodes {
            if members.contains(node) {
                self.reject(
                    origin,
                    ConfigError::DuplicateSegmentMember {
                        segment: name.to_string(),
                        node: node.clone(),
                    },
                );
                continue;
            }
            self.nodes.insert(node.clone());
            members.push(node.clone());
        }

        self.push_segment(PendingSegment {
            name: name.to_string(),
            kind: PendingKind::Eth(bandwidth),
            members,
        });
        Ok(())
    }

    fn add_udp4(&mut self, origin: usize, name: &str, entries: &[String]) -> Result<(), ConfigError> {
        self.check_segment_name(name)?;

        let mut addresses = BTreeMap::new();
        let mut members = Vec::with_capacity(entries.len());
        for entry in entries {
            match parse_member(entry) {
                Ok((node, ip)) => {
                    if addresses.contains_key(node) {
                        self.reject(
                            origin,
                            ConfigError::DuplicateSegmentMember {
                                segment: name.to_string(),
                                node: node.to_string(),
                            },
                        );
                        continue;
                    }
                    self.nodes.insert(node.to_string());
                    addresses.insert(node.to_string(), ip);
                    members.push(node.to_string());
                }
                // A bad member is dropped, the rest of the segment is kept
                Err(e) => self.reject(origin, e),
            }
        }

        self.push_segment(PendingSegment {
            name: name.to_string(),
            kind: PendingKind::Udp4(addresses),
            members,
        });
        Ok(())
    }

    fn add_membership(&mut self, name: &str, node: &str, lowers: &[String]) -> Result<(), ConfigError> {
        if self.segment_index.contains_key(name) {
            return Err(ConfigError::NameClash(name.to_string()));
        }
        self.nodes.insert(node.to_string());

        let idx = match self.layer_index.get(name) {
            Some(&idx) => idx,
            None => {
                self.layer_index.insert(name.to_string(), self.layers.len());
                self.layers.push(PendingLayer {
                    name: name.to_string(),
                    members: BTreeMap::new(),
                });
                self.layers.len() - 1
            }
        };

        let layer = &mut self.layers[idx];
        if layer.members.contains_key(node) {
            return Err(ConfigError::DuplicateMembership {
                layer: name.to_string(),
                node: node.to_string(),
            });
        }
        layer.members.insert(node.to_string(), lowers.to_vec());
        Ok(())
    }

    /// Resolve names, number nodes and segments, and assign ports
    pub fn finish(self) -> Result<Topology, TopologyError> {
        let mut topology = Topology::default();

        for (i, name) in self.nodes.into_iter().enumerate() {
            topology.node_index.insert(name.clone(), NodeId(i));
            topology.nodes.push(Node {
                name,
                id: i as u32 + 1,
                ports: Vec::new(),
            });
        }

        for (i, pending) in self.segments.into_iter().enumerate() {
            let members: Vec<NodeId> = pending
                .members
                .iter()
                .map(|m| lookup(&topology.node_index, m))
                .collect();
            let kind = match pending.kind {
                PendingKind::Eth(bandwidth) => SegmentKind::Eth { bandwidth },
                PendingKind::Udp4(addresses) => SegmentKind::Udp4 {
                    addresses: addresses
                        .into_iter()
                        .map(|(node, ip)| (lookup(&topology.node_index, &node), ip))
                        .collect(),
                },
            };
            topology
                .unit_index
                .insert(pending.name.clone(), UnitId::Segment(SegmentId(i)));
            topology.segments.push(BaseSegment {
                name: pending.name,
                id: i as u32 + 1,
                kind,
                members,
            });
        }

        for (i, pending) in self.layers.iter().enumerate() {
            topology
                .unit_index
                .insert(pending.name.clone(), UnitId::Layer(LayerId(i)));
        }

        for pending in self.layers {
            let mut members = BTreeMap::new();
            for (node, lowers) in &pending.members {
                let resolved = lowers
                    .iter()
                    .map(|lower| {
                        topology.unit_id(lower).ok_or_else(|| TopologyError::UnknownLower {
                            layer: pending.name.clone(),
                            node: node.clone(),
                            lower: lower.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                members.insert(lookup(&topology.node_index, node), resolved);
            }
            topology.layers.push(Layer {
                name: pending.name,
                members,
            });
        }

        assign_ports(&mut topology);
        Ok(topology)
    }
}

/// Every name referenced by a kept declaration was added to the node set
fn lookup(index: &HashMap<String, NodeId>, name: &str) -> NodeId {
    index[name]
}

/// Split "node:a.b.c.d/len" and validate the address
fn parse_member(entry: &str) -> Result<(&str, Ipv4Prefix), ConfigError> {
    let (node, address) = entry
        .split_once(':')
        .filter(|(node, address)| !node.is_empty() && !address.contains(':'))
        .ok_or_else(|| ConfigError::MalformedMember(entry.to_string()))?;
    let ip = address.parse::<Ipv4Prefix>().map_err(|e| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    Ok((node, ip))
}

/// Ports follow (segment name, node name) order, numbered per node from 1
fn assign_ports(topology: &mut Topology) {
    let mut links: Vec<(&str, &str, SegmentId, NodeId)> = Vec::new();
    for (sid, segment) in topology.segments() {
        for &nid in &segment.members {
            links.push((segment.name.as_str(), topology.node_name(nid), sid, nid));
        }
    }
    links.sort();

    let assignments: Vec<(SegmentId, NodeId, Option<Ipv4Prefix>)> = links
        .into_iter()
        .map(|(_, _, sid, nid)| {
            let ip = match &topology.segment(sid).kind {
                SegmentKind::Udp4 { addresses } => addresses.get(&nid).copied(),
                SegmentKind::Eth { .. } => None,
            };
            (sid, nid, ip)
        })
        .collect();

    for (segment, nid, ip) in assignments {
        let node = &mut topology.nodes[nid.0];
        let idx = node.ports.len() as u32 + 1;
        let tap = format!("{}.{:02x}", node.name, idx);
        node.ports.push(Port { idx, tap, segment, ip });
    }
}
