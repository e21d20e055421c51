//! Topology type definitions.
//!
//! Nodes, base segments and layers live in arenas owned by [`Topology`] and
//! are addressed by index types. Layers and base segments share one
//! namespace; [`UnitId`] is the vertex type of the dependency graph.

use crate::ip::Ipv4Prefix;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Index of a node. Nodes are stored sorted by name, so index order is name order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub(crate) usize);

/// A vertex of the dependency graph: either a base segment or a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitId {
    Segment(SegmentId),
    Layer(LayerId),
}

impl UnitId {
    pub fn as_layer(&self) -> Option<LayerId> {
        match self {
            Self::Layer(id) => Some(*id),
            Self::Segment(_) => None,
        }
    }
}

/// Unit of a segment bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Giga,
    Mega,
    Kilo,
}

impl RateUnit {
    fn suffix(self) -> char {
        match self {
            RateUnit::Giga => 'g',
            RateUnit::Mega => 'm',
            RateUnit::Kilo => 'k',
        }
    }
}

/// Bandwidth of an Ethernet-like segment, e.g. "100Mbps"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bandwidth {
    pub value: u64,
    pub unit: RateUnit,
}

impl Bandwidth {
    /// Zero bandwidth means the segment is not rate limited
    pub fn is_limited(&self) -> bool {
        self.value > 0
    }

    /// Rate in `tc` syntax, e.g. "100mbit"
    pub fn tc_rate(&self) -> String {
        format!("{}{}bit", self.value, self.unit.suffix())
    }
}

impl FromStr for Bandwidth {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_suffix("bps").ok_or(())?;
        let (last, _) = digits.char_indices().last().ok_or(())?;
        let (number, unit) = digits.split_at(last);
        let unit = match unit {
            "G" => RateUnit::Giga,
            "M" => RateUnit::Mega,
            "K" => RateUnit::Kilo,
            _ => return Err(()),
        };
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        let value = number.parse().map_err(|_| ())?;
        Ok(Self { value, unit })
    }
}

/// Kind of a base segment
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentKind {
    /// Point-to-multipoint Ethernet-like segment
    Eth { bandwidth: Bandwidth },
    /// IP-reachable segment with one address per member
    Udp4 { addresses: BTreeMap<NodeId, Ipv4Prefix> },
}

impl SegmentKind {
    /// Shim type name used by `rlite-ctl`
    pub fn shim_type(&self) -> &'static str {
        match self {
            SegmentKind::Eth { .. } => "eth",
            SegmentKind::Udp4 { .. } => "udp4",
        }
    }
}

/// A leaf transport construct ("shim"). Always a source of the dependency graph.
#[derive(Debug, Clone)]
pub struct BaseSegment {
    pub name: String,
    /// 1-based, in declaration order
    pub id: u32,
    pub kind: SegmentKind,
    pub members: Vec<NodeId>,
}

/// A composed layer ("DIF")
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    /// Member node -> ordered lower layers/segments it uses inside this layer
    pub members: BTreeMap<NodeId, Vec<UnitId>>,
}

impl Layer {
    /// Union of the lower units declared by all members
    pub fn dependencies(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.members.values().flatten().copied()
    }
}

/// Attachment of a node to a base segment
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    /// 1-based index among the node's ports
    pub idx: u32,
    /// Tap device name on the host
    pub tap: String,
    pub segment: SegmentId,
    /// Address on udp4 segments
    pub ip: Option<Ipv4Prefix>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// 1-based, in name order
    pub id: u32,
    pub ports: Vec<Port>,
}

impl Node {
    pub fn mgmt_mac(&self) -> String {
        self.port_mac(99)
    }

    pub fn port_mac(&self, idx: u32) -> String {
        format!("00:0a:0a:0a:{:02x}:{:02x}", self.id, idx)
    }
}

/// The complete, finalized topology of one planning run
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub(crate) nodes: Vec<Node>,
    pub(crate) segments: Vec<BaseSegment>,
    pub(crate) layers: Vec<Layer>,
    pub(crate) node_index: HashMap<String, NodeId>,
    pub(crate) unit_index: HashMap<String, UnitId>,
}

impl Topology {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn segment(&self, id: SegmentId) -> &BaseSegment {
        &self.segments[id.0]
    }

    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layers[id.0]
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_index.get(name).copied()
    }

    pub fn unit_id(&self, name: &str) -> Option<UnitId> {
        self.unit_index.get(name).copied()
    }

    /// Name of a segment or layer
    pub fn unit_name(&self, unit: UnitId) -> &str {
        match unit {
            UnitId::Segment(id) => &self.segment(id).name,
            UnitId::Layer(id) => &self.layer(id).name,
        }
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    /// Nodes in name order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Segments in declaration order
    pub fn segments(&self) -> impl Iterator<Item = (SegmentId, &BaseSegment)> {
        self.segments.iter().enumerate().map(|(i, s)| (SegmentId(i), s))
    }

    /// Layers in first-declaration order
    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &Layer)> {
        self.layers.iter().enumerate().map(|(i, l)| (LayerId(i), l))
    }

    /// Every segment and layer
    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        (0..self.segments.len())
            .map(|i| UnitId::Segment(SegmentId(i)))
            .chain((0..self.layers.len()).map(|i| UnitId::Layer(LayerId(i))))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.segments.is_empty() && self.layers.is_empty()
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} shims, {} difs",
            self.nodes.len(),
            self.segments.len(),
            self.layers.len()
        )
    }
}
