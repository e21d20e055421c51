//! Testbed generation orchestrator.
//!
//! This module coordinates the overall generation process, from the loaded
//! topology through planning to the scripts written in the output directory.

use crate::config::{PlanOptions, ScriptOptions};
use crate::plan::{self, Plan};
use crate::script::{render_dot, render_down, render_map, render_up};
use crate::topology::Topology;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Paths of the files written by [`write_scripts`]
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFiles {
    pub up: PathBuf,
    pub down: PathBuf,
    pub map: PathBuf,
    pub dot: Option<PathBuf>,
}

fn write_file(path: &Path, content: &str, executable: bool) -> Result<()> {
    fs::write(path, content).wrap_err_with(|| format!("Failed to write '{}'", path.display()))?;

    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(path, perms)
            .wrap_err_with(|| format!("Failed to make '{}' executable", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = executable;

    info!("Wrote {:?}", path);
    Ok(())
}

/// Render every script for an already computed plan into `output_dir`
pub fn write_scripts(
    topology: &Topology,
    plan: &Plan,
    options: &ScriptOptions,
    output_dir: &Path,
    graphviz: bool,
) -> Result<GeneratedFiles> {
    options.validate(topology.node_count())?;
    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    let files = GeneratedFiles {
        up: output_dir.join("up.sh"),
        down: output_dir.join("down.sh"),
        map: output_dir.join("demo.map"),
        dot: graphviz.then(|| output_dir.join("difs.dot")),
    };

    write_file(&files.up, &render_up(topology, plan, options), true)?;
    write_file(&files.down, &render_down(topology), true)?;
    write_file(&files.map, &render_map(topology, options), false)?;
    if let Some(dot) = &files.dot {
        write_file(dot, &render_dot(topology), false)?;
    }

    Ok(files)
}

/// Plan the topology and write the scripts. A cyclic topology aborts
/// before anything is written.
pub fn generate_testbed(
    topology: &Topology,
    plan_options: &PlanOptions,
    script_options: &ScriptOptions,
    output_dir: &Path,
    graphviz: bool,
) -> Result<(Plan, GeneratedFiles)> {
    let plan = plan::plan(topology, plan_options)?;
    info!(
        "Planned {} operations over {} DIFs",
        plan.operation_count(),
        plan.layers.len()
    );

    let files = write_scripts(topology, &plan, script_options, output_dir, graphviz)?;
    Ok((plan, files))
}
