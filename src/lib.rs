//! # DifSim - Bring-up planner for multi-layer virtual network testbeds
//!
//! This library turns a description of a layered network testbed into the
//! scripts that build it out of QEMU guests, host bridges and tap devices.
//!
//! ## Overview
//!
//! Nodes are attached to base segments ("shims"): Ethernet-like bridges
//! with an optional rate limit, or IP-reachable udp4 segments. Layers
//! ("DIFs") are stacked recursively on top of shims or other layers. Before
//! any command is issued the planner decides:
//!
//! - in which order layers can be activated, since a layer cannot come up
//!   before the layers it runs on
//! - which members of each layer must enroll against which neighbor, and
//!   through which lower layer, so that the layer becomes connected
//!
//! ## Architecture
//!
//! - `config`: declarations, strategy and script options, configuration errors
//! - `config_loader`: `.conf` and YAML loading
//! - `topology`: nodes, shims and DIFs, port assignment, ring generator
//! - `ip`: IPv4 prefixes of udp4 members
//! - `plan`: dependency graph, Kahn ordering, neighbor graphs, enrollment
//! - `script`: `up.sh`, `down.sh`, `demo.map` and Graphviz rendering
//! - `orchestrator`: planning plus writing the generated files
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use difsim::config::{PlanOptions, ScriptOptions};
//! use difsim::{config_loader, orchestrator};
//! use std::path::Path;
//!
//! let topology = config_loader::load_topology(Path::new("demo.conf"))?;
//! let (plan, files) = orchestrator::generate_testbed(
//!     &topology,
//!     &PlanOptions::default(),
//!     &ScriptOptions::default(),
//!     Path::new("."),
//!     false,
//! )?;
//! println!("{} operations written to {:?}", plan.operation_count(), files.up);
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```text
//! eth b1 100Mbps m1 m2
//! udp4 u1 m2:10.0.0.2/24 m3:10.0.0.3/24
//! dif n m1 b1
//! dif n m2 b1 u1
//! dif n m3 u1
//! ```
//!
//! ## Error Handling
//!
//! Conflicting declarations are logged and skipped. Unknown lower layers,
//! circular dependencies and (optionally) disconnected layers abort the run.
//! Library errors are `thiserror` enums; application-level functions return
//! `color_eyre::Result`.

pub mod config;
pub mod config_loader;
pub mod ip;
pub mod orchestrator;
pub mod plan;
pub mod script;
pub mod topology;
