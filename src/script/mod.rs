//! # Script generation
//!
//! Renders the plan into the artifacts an operator runs on the host:
//!
//! - `up.sh`: bridges, taps, guests, IPCP setup and the planned operations
//! - `down.sh`: teardown of everything `up.sh` created
//! - `demo.map`: node name to forwarded SSH port
//! - `difs.dot`: neighbor graphs of every layer, for Graphviz
//!
//! Rendering is pure; writing files is left to the orchestrator.

pub mod dot;
pub mod down;
pub mod map;
pub mod up;

pub use dot::render_dot;
pub use down::render_down;
pub use map::render_map;
pub use up::{dns_mappings, render_up, DnsMapping};
