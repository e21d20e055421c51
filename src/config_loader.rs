//! Loading of `.conf` and YAML topology files.

use crate::config::{Declaration, SourceDeclaration};
use crate::topology::{Topology, TopologyBuilder};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

struct LineGrammar {
    eth: Regex,
    udp4: Regex,
    dif: Regex,
}

fn grammar() -> &'static LineGrammar {
    static GRAMMAR: OnceLock<LineGrammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| LineGrammar {
        eth: Regex::new(r"^\s*eth\s+(\w+)\s+(\S+)\s+(\w.*)$").expect("eth regex is valid"),
        udp4: Regex::new(r"^\s*udp4\s+(\w+)\s+(\w.*)$").expect("udp4 regex is valid"),
        dif: Regex::new(r"^\s*dif\s+(\w+)\s+(\w+)\s+(\w.*)$").expect("dif regex is valid"),
    })
}

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Parse the line-oriented `demo.conf` format
///
/// Lines starting with `#` and lines matching no declaration are ignored.
/// Each declaration records its 1-based line number.
pub fn parse_conf(text: &str) -> Vec<SourceDeclaration> {
    let g = grammar();
    let mut declarations = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let origin = i + 1;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let declaration = if let Some(caps) = g.eth.captures(line) {
            Declaration::Eth {
                name: caps[1].to_string(),
                bandwidth: caps[2].to_string(),
                nodes: words(&caps[3]),
            }
        } else if let Some(caps) = g.udp4.captures(line) {
            Declaration::Udp4 {
                name: caps[1].to_string(),
                members: words(&caps[2]),
            }
        } else if let Some(caps) = g.dif.captures(line) {
            Declaration::Dif {
                name: caps[1].to_string(),
                node: caps[2].to_string(),
                lowers: words(&caps[3]),
            }
        } else {
            debug!("Line {}: ignoring '{}'", origin, line);
            continue;
        };

        declarations.push(SourceDeclaration { origin, declaration });
    }

    declarations
}

/// Parse a YAML list of declarations; origins are 1-based entry indices
pub fn parse_yaml(text: &str) -> Result<Vec<SourceDeclaration>> {
    let entries: Vec<Declaration> =
        serde_yaml::from_str(text).wrap_err("Failed to parse YAML topology")?;
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(i, declaration)| SourceDeclaration { origin: i + 1, declaration })
        .collect())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Load declarations from a `.conf` or `.yaml` file
pub fn load_declarations(path: &Path) -> Result<Vec<SourceDeclaration>> {
    info!("Loading topology from: {:?}", path);

    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read topology file '{}'", path.display()))?;

    let declarations = if is_yaml(path) {
        parse_yaml(&text)?
    } else {
        parse_conf(&text)
    };

    debug!("Read {} declarations", declarations.len());
    Ok(declarations)
}

/// Build a finalized topology from declarations, skipping conflicting ones
pub fn build_topology(declarations: &[SourceDeclaration]) -> Result<Topology> {
    let builder = TopologyBuilder::from_declarations(declarations);
    let skipped = builder.rejected().len();
    if skipped > 0 {
        warn!("Skipped {} conflicting declarations", skipped);
    }

    let topology = builder.finish()?;
    info!("Topology: {}", topology);
    Ok(topology)
}

/// Load declarations from a file and build the topology
pub fn load_topology(path: &Path) -> Result<Topology> {
    let declarations = load_declarations(path)?;
    build_topology(&declarations)
}
