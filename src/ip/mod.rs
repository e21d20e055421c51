//! IPv4 addressing module.
//!
//! This module handles the `address/length` prefixes attached to members of
//! IP-reachable base segments.

pub mod prefix;

// Re-export commonly used types
pub use prefix::{Ipv4Prefix, PrefixError};
