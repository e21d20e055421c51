//! Network topology module.
//!
//! This module contains the in-memory model of a testbed (nodes, base
//! segments, layers), its construction from declarations, and the ring
//! topology generator.

pub mod types;
pub mod builder;
pub mod ring;

// Re-export key types and functions for easier access
pub use types::{
    Bandwidth, BaseSegment, Layer, LayerId, Node, NodeId, Port, SegmentId, SegmentKind, Topology,
    UnitId,
};
pub use builder::{Rejection, TopologyBuilder, TopologyError};
pub use ring::ring_conf;
