//! `stackgraph` command line
//!
//! Builds a graph from a manifest and a configuration profile, then either
//! prints the launch plan or drives the roots against the in-memory
//! provider.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use stackgraph_core::config::{self, DEFAULT_PROFILE};
use stackgraph_core::dependency;
use stackgraph_core::driver::{Driver, DriverConfig};
use stackgraph_core::graph::StackGraph;
use stackgraph_core::logging;
use stackgraph_core::manifest::{BuiltGraph, Manifest};
use stackgraph_core::provider::InMemoryProvider;
use stackgraph_core::types::{NodeId, NodeState, Outputs, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// stackgraph - sequence cloud stack creation as a dependency graph
#[derive(Parser, Debug)]
#[command(name = "stackgraph")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Common {
    /// Region stacks are created in
    #[arg(long, global = true, default_value = "us-east-1")]
    region: String,

    /// Profile configuration file
    #[arg(long, global = true)]
    config_path: Option<PathBuf>,

    /// Profile to read from the configuration file
    #[arg(long, global = true, default_value = DEFAULT_PROFILE)]
    profile: String,

    /// Graph manifest
    #[arg(long, global = true, default_value = "stacks.toml")]
    manifest: PathBuf,

    /// Deployment tier
    #[arg(long, global = true, value_enum, default_value_t = StackType::Dev)]
    stack_type: StackType,

    /// Color of a blue/green style deployment
    #[arg(long, global = true, value_enum)]
    stack_color: Option<StackColor>,

    /// Polling interval in milliseconds
    #[arg(long, global = true, default_value_t = 10_000)]
    interval_ms: u64,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the launch order and each node's dependencies
    Plan,

    /// Drive every root to completion against the in-memory provider
    Launch {
        /// Status reads before a simulated stack completes
        #[arg(long, default_value_t = 0)]
        complete_after: u32,

        /// Base name of a stack that should roll back (repeatable)
        #[arg(long)]
        fail: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StackType {
    Dev,
    Staging,
    Prod,
}

impl StackType {
    fn tag(self) -> &'static str {
        match self {
            Self::Dev => "Development",
            Self::Staging => "Staging",
            Self::Prod => "Production",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StackColor {
    Green,
    Blue,
    Orange,
}

impl StackColor {
    fn tag(self) -> &'static str {
        match self {
            Self::Green => "Green",
            Self::Blue => "Blue",
            Self::Orange => "Orange",
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(&cli.common.log_level);

    let config = load_config(&cli.common)?;
    let manifest = Manifest::from_file(&cli.common.manifest)
        .with_context(|| format!("loading manifest {}", cli.common.manifest.display()))?;

    let mut provider = InMemoryProvider::new();
    if let Commands::Launch { complete_after, fail } = &cli.command {
        provider = provider.with_complete_after(*complete_after);
        for name in fail {
            provider.fail_stack(name.clone());
        }
    }
    manifest.script(&provider);

    let mut graph = StackGraph::new(provider);
    let built = manifest.build(&mut graph, config).context("building graph")?;
    let targets = targets(&cli.common, &built);
    if targets.is_empty() {
        anyhow::bail!("manifest {} names no roots", cli.common.manifest.display());
    }

    match cli.command {
        Commands::Plan => {
            plan(&graph, targets)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Launch { .. } => {
            let driver = Driver::new(DriverConfig::with_interval(Duration::from_millis(
                cli.common.interval_ms,
            )));
            let settled = driver.run_all(&mut graph, targets)?;
            report(&graph, &built)?;
            if settled.iter().any(|(_, state)| *state == NodeState::Failed) {
                tracing::error!("at least one root failed");
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(common: &Common) -> anyhow::Result<Outputs> {
    let mut config = match &common.config_path {
        Some(path) => config::load_profile(path, &common.profile)
            .with_context(|| format!("loading profile `{}`", common.profile))?,
        None => Outputs::new(),
    };
    config.insert("Region".into(), Value::from(common.region.as_str()));
    config.insert("StackType".into(), Value::from(common.stack_type.tag()));
    if let Some(color) = common.stack_color {
        config.insert("StackColor".into(), Value::from(color.tag()));
    }
    Ok(config)
}

/// Every root for a colored deployment, the base roots otherwise
fn targets<'a>(common: &Common, built: &'a BuiltGraph) -> &'a [NodeId] {
    let colored = common.stack_color.is_some();
    let targets = built.targets(colored);
    tracing::debug!(colored, roots = targets.len(), "selected roots");
    targets
}

fn plan(graph: &StackGraph, roots: &[NodeId]) -> anyhow::Result<()> {
    for root in roots {
        let order = graph.launch_order(*root)?;
        let name = graph.node(*root).map_or("?", |n| n.name());
        println!("{name}:");
        for (step, id) in order.iter().enumerate() {
            let Some(node) = graph.node(*id) else { continue };
            let requires = dependency::compute_requires(node, graph);
            if node.state() == NodeState::Finished {
                println!("  {step:>2}. {} (ready)", node.name());
            } else if requires.is_empty() {
                println!("  {step:>2}. {} [{}]", node.name(), node.kind().label());
            } else {
                println!(
                    "  {step:>2}. {} [{}] after {}",
                    node.name(),
                    node.kind().label(),
                    requires.join(", ")
                );
            }
        }
    }
    Ok(())
}

fn report(graph: &StackGraph, built: &BuiltGraph) -> anyhow::Result<()> {
    for (name, id) in &built.nodes {
        let Some(node) = graph.node(*id) else { continue };
        let stack = node.stack_name().unwrap_or("-");
        println!("{name:<24} {:<9} {stack}", node.state());
        if node.state() == NodeState::Finished && !node.outputs().is_empty() && *name != "global" {
            println!("{}", serde_json::to_string_pretty(node.outputs())?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_launch_flags() {
        let cli = Cli::try_parse_from([
            "stackgraph",
            "--stack-type",
            "prod",
            "--stack-color",
            "blue",
            "launch",
            "--complete-after",
            "2",
            "--fail",
            "VPC",
        ])
        .unwrap();
        assert_eq!(cli.common.stack_type, StackType::Prod);
        assert_eq!(cli.common.stack_color, Some(StackColor::Blue));
        assert!(matches!(
            cli.command,
            Commands::Launch { complete_after: 2, ref fail } if fail == &["VPC".to_string()]
        ));
    }

    #[test]
    fn config_carries_deployment_tags() {
        let cli = Cli::try_parse_from(["stackgraph", "--stack-type", "staging", "plan"]).unwrap();
        let config = load_config(&cli.common).unwrap();
        assert_eq!(config["Region"], Value::from("us-east-1"));
        assert_eq!(config["StackType"], Value::from("Staging"));
        assert!(!config.contains_key("StackColor"));
    }

    #[test]
    fn color_selects_every_root() {
        let manifest = Manifest::from_toml(
            r#"
roots = ["Web"]
base_roots = ["Base"]

[[node]]
name = "Base"

[[node]]
name = "Web"
"#,
        )
        .unwrap();
        let mut graph = StackGraph::new(InMemoryProvider::new());
        let built = manifest.build(&mut graph, Outputs::new()).unwrap();

        let base = Cli::try_parse_from(["stackgraph", "plan"]).unwrap();
        assert_eq!(targets(&base.common, &built), &[built.nodes["Base"]]);

        let colored = Cli::try_parse_from(["stackgraph", "--stack-color", "green", "plan"]).unwrap();
        assert_eq!(targets(&colored.common, &built), &[built.nodes["Web"]]);
    }
}
