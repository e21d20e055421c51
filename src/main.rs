use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

use difsim::config::{EnrollmentStrategy, Frontend, PlanOptions, ScriptOptions, Verbosity};
use difsim::topology::ring_conf;
use difsim::{config_loader, orchestrator, plan};

/// Generate bring-up and teardown scripts for a multi-layer network testbed
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Topology file (.conf lines or a .yaml list of declarations)
    #[arg(short, long, default_value = "demo.conf")]
    conf: PathBuf,

    /// Output directory for up.sh, down.sh and demo.map
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Amount of memory per node, in megabytes
    #[arg(short, long, default_value_t = 128)]
    memory: u32,

    /// Base SSH port to map nodes
    #[arg(short = 'p', long, default_value_t = 2222)]
    base_port: u16,

    /// Minimal uses a spanning tree of each DIF
    #[arg(short, long, value_enum, default_value_t = EnrollmentStrategy::Minimal)]
    enrollment_strategy: EnrollmentStrategy,

    /// Use a ring topology with this many nodes instead of the topology file
    #[arg(long)]
    ring: Option<usize>,

    /// Verbosity level for kernel and userspace
    #[arg(long, value_enum, default_value_t = Verbosity::Dbg)]
    verbosity: Verbosity,

    /// Emulated NIC the nodes will use
    #[arg(short, long, value_enum, default_value_t = Frontend::VirtioNetPci)]
    frontend: Frontend,

    /// Use vhost acceleration for the virtio-net frontend
    #[arg(long)]
    vhost: bool,

    /// Also write the DIF graphs as difs.dot
    #[arg(short, long)]
    graphviz: bool,

    /// Fail when a DIF cannot be fully enrolled instead of warning
    #[arg(long)]
    strict_connectivity: bool,

    /// Print the plan as JSON and write nothing
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            strategy: self.enrollment_strategy,
            strict_connectivity: self.strict_connectivity,
        }
    }

    fn script_options(&self, node_count: usize) -> ScriptOptions {
        let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
        let mut memory = self.memory;
        if node_count > 8 {
            info!("Running {} nodes, giving each node time to boot and 128 MB of memory", node_count);
            memory = 128;
        }
        ScriptOptions {
            memory,
            base_port: self.base_port,
            verbosity: self.verbosity,
            frontend: self.frontend,
            vhost: self.vhost,
            boot_batch_size: (cpus / 2).max(1),
            ..ScriptOptions::default()
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let declarations = match args.ring.filter(|&n| n > 0) {
        Some(size) => {
            warn!("Ignoring {:?}, generating ring topology of {} nodes", args.conf, size);
            let text = ring_conf(size);
            if !args.dry_run {
                fs::create_dir_all(&args.output).wrap_err_with(|| {
                    format!("Failed to create output directory '{}'", args.output.display())
                })?;
                let path = args.output.join("ring.conf");
                fs::write(&path, &text)
                    .wrap_err_with(|| format!("Failed to write '{}'", path.display()))?;
            }
            config_loader::parse_conf(&text)
        }
        None => config_loader::load_declarations(&args.conf)?,
    };

    let topology = config_loader::build_topology(&declarations)?;

    if args.dry_run {
        let plan = plan::plan(&topology, &args.plan_options())?;
        println!("{}", serde_json::to_string_pretty(&plan.summary(&topology))?);
        return Ok(());
    }

    let script_options = args.script_options(topology.node_count());
    let (plan, files) = orchestrator::generate_testbed(
        &topology,
        &args.plan_options(),
        &script_options,
        &args.output,
        args.graphviz,
    )?;

    info!(
        "Generated {:?} with {} operations; tear down with {:?}",
        files.up,
        plan.operation_count(),
        files.down
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["difsim"]);

        assert_eq!(args.conf, PathBuf::from("demo.conf"));
        assert_eq!(args.output, PathBuf::from("."));
        assert_eq!(args.memory, 128);
        assert_eq!(args.base_port, 2222);
        assert_eq!(args.enrollment_strategy, EnrollmentStrategy::Minimal);
        assert_eq!(args.verbosity, Verbosity::Dbg);
        assert_eq!(args.frontend, Frontend::VirtioNetPci);
        assert!(args.ring.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_cli_options() {
        let args = Args::parse_from([
            "difsim",
            "-c", "topo.yaml",
            "-e", "full-mesh",
            "--verbosity", "WARN",
            "-f", "e1000",
            "--ring", "4",
            "--strict-connectivity",
        ]);

        assert_eq!(args.conf, PathBuf::from("topo.yaml"));
        assert_eq!(args.ring, Some(4));
        let plan_options = args.plan_options();
        assert_eq!(plan_options.strategy, EnrollmentStrategy::FullMesh);
        assert!(plan_options.strict_connectivity);
        assert_eq!(args.verbosity, Verbosity::Warn);
        assert_eq!(args.frontend, Frontend::E1000);
    }

    #[test]
    fn test_memory_forced_for_large_topologies() {
        let args = Args::parse_from(["difsim", "-m", "512"]);
        assert_eq!(args.script_options(4).memory, 512);
        assert_eq!(args.script_options(9).memory, 128);
        assert!(args.script_options(9).boot_batch_size >= 1);
    }
}
