//! Topology declarations, planning and script options, configuration errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single topology declaration, as read from a `.conf` line or a YAML entry
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Declaration {
    /// Rate-limited Ethernet-like base segment
    Eth {
        name: String,
        /// Bandwidth such as "100Mbps"; "0Mbps" disables rate limiting
        bandwidth: String,
        nodes: Vec<String>,
    },
    /// IP-reachable base segment
    Udp4 {
        name: String,
        /// Members written as "node:a.b.c.d/len"
        members: Vec<String>,
    },
    /// Membership of one node in a layer
    Dif {
        name: String,
        node: String,
        lowers: Vec<String>,
    },
}

/// A declaration together with where it came from (line or entry number)
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDeclaration {
    pub origin: usize,
    pub declaration: Declaration,
}

/// How each layer is made connected
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EnrollmentStrategy {
    /// Enroll along a spanning tree of the layer
    #[default]
    Minimal,
    /// Spanning tree plus a lower flow for every remaining neighbor pair
    FullMesh,
}

/// Verbosity passed to the kernel modules and the userspace daemon
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum Verbosity {
    Very,
    #[default]
    Dbg,
    Info,
    Warn,
    Quiet,
}

impl Verbosity {
    /// Numeric level used by the `rlite` kernel module
    pub fn index(self) -> u8 {
        match self {
            Verbosity::Quiet => 1,
            Verbosity::Warn => 2,
            Verbosity::Info => 3,
            Verbosity::Dbg => 4,
            Verbosity::Very => 5,
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verbosity::Very => "VERY",
            Verbosity::Dbg => "DBG",
            Verbosity::Info => "INFO",
            Verbosity::Warn => "WARN",
            Verbosity::Quiet => "QUIET",
        };
        f.write_str(s)
    }
}

/// Emulated NIC used by the nodes
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Frontend {
    #[default]
    VirtioNetPci,
    E1000,
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frontend::VirtioNetPci => f.write_str("virtio-net-pci"),
            Frontend::E1000 => f.write_str("e1000"),
        }
    }
}

/// Options consumed by the planner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub strategy: EnrollmentStrategy,
    /// Fail instead of warning when a layer cannot be fully enrolled
    pub strict_connectivity: bool,
}

/// Options consumed by the script emitters
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    /// Memory per node, in megabytes
    pub memory: u32,
    /// SSH port of node N is `base_port + N`
    pub base_port: u16,
    pub verbosity: Verbosity,
    pub frontend: Frontend,
    pub vhost: bool,
    /// Directory holding bzImage, rootfs.cpio and the SSH key
    pub image_dir: String,
    pub username: String,
    /// Number of nodes booted before pausing
    pub boot_batch_size: usize,
    /// Pause between boot batches, in seconds
    pub wait_for_boot: u32,
}

impl ScriptOptions {
    /// Validate the options against the number of nodes to deploy
    pub fn validate(&self, node_count: usize) -> Result<(), ConfigError> {
        if self.memory == 0 {
            return Err(ConfigError::InvalidOption("memory must be positive".to_string()));
        }
        if self.boot_batch_size == 0 {
            return Err(ConfigError::InvalidOption(
                "boot batch size must be positive".to_string(),
            ));
        }
        // One SSH port per node after the base port
        let highest = self.base_port as usize + node_count;
        if highest > u16::MAX as usize {
            return Err(ConfigError::InvalidOption(format!(
                "base port {} leaves no room for {} nodes",
                self.base_port, node_count
            )));
        }
        Ok(())
    }

    pub fn ssh_key(&self) -> String {
        format!("{}/buildroot_rsa", self.image_dir)
    }

    pub fn ssh_opts(&self) -> String {
        format!(
            "-o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null -o IdentityFile={}",
            self.ssh_key()
        )
    }
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            memory: 128,
            base_port: 2222,
            verbosity: Verbosity::default(),
            frontend: Frontend::default(),
            vhost: false,
            image_dir: "buildroot".to_string(),
            username: "root".to_string(),
            boot_batch_size: 1,
            wait_for_boot: 12,
        }
    }
}

/// Configuration errors. All of these are recoverable while loading: the
/// offending declaration is reported and skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("shim {0} already defined")]
    DuplicateSegment(String),
    #[error("node {node} in dif {layer} already specified")]
    DuplicateMembership { layer: String, node: String },
    #[error("name {0} is used both as a shim and as a dif")]
    NameClash(String),
    #[error("bandwidth '{0}' is not of the form <N><G|M|K>bps")]
    InvalidBandwidth(String),
    #[error("member '{0}' is not of the form node:address")]
    MalformedMember(String),
    #[error("ip {address} is not valid: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("node {node} listed twice in shim {segment}")]
    DuplicateSegmentMember { segment: String, node: String },
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}
