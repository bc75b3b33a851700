use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use econflow_layout::{Diagram, Graph, LayoutConfig, Palette, Scene, SvgSurface, layout_graph, realize, reconstruct, validate};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "econflow", version, about = "Economy flow diagram layout")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out a graph and write it as SVG
    Layout {
        graph: PathBuf,

        /// Output file; defaults to the graph path with an .svg extension
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Layout config JSON
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,

        /// Palette overrides JSON, e.g. {"sink": "#FF0000"}
        #[arg(short = 'p', long = "palette")]
        palette: Option<PathBuf>,

        /// Skip the crossing reduction sweep
        #[arg(long = "no-optimize")]
        no_optimize: bool,
    },
    /// Validate a graph without laying it out
    Check { graph: PathBuf },
    /// Lay out, draw and read back a graph, printing the result as JSON
    Sync {
        graph: PathBuf,

        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Layout {
            graph,
            output,
            config,
            palette,
            no_optimize,
        } => {
            let mut config = load_config(config.as_deref())?;
            if no_optimize {
                config.optimize = false;
            }
            let palette = load_palette(palette.as_deref())?;
            let diagram = lay_out(&graph, &config)?;

            let mut surface = SvgSurface::new();
            realize(&diagram, &palette, &mut surface).context("failed to draw diagram")?;
            let output = output.unwrap_or_else(|| graph.with_extension("svg"));
            surface
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;

            print_summary(&diagram);
            println!("wrote {}", output.display());
        }
        Command::Check { graph } => {
            let graph = load_graph(&graph)?;
            if let Err(error) = validate(&graph) {
                bail!("{error}");
            }
            println!("ok: {} nodes, {} edges", graph.node_count(), graph.edges.len());
        }
        Command::Sync { graph, config } => {
            let config = load_config(config.as_deref())?;
            let diagram = lay_out(&graph, &config)?;
            let mut scene = Scene::new();
            realize(&diagram, &Palette::default(), &mut scene).context("failed to draw diagram")?;
            let synced = reconstruct(&scene)?;
            println!("{}", synced.to_json_pretty()?);
        }
    }

    Ok(())
}

fn load_graph(path: &Path) -> Result<Graph> {
    let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Graph::from_json(&json).with_context(|| format!("failed to parse graph {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<LayoutConfig> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    LayoutConfig::from_json(&json).with_context(|| format!("failed to parse config {}", path.display()))
}

fn load_palette(path: Option<&Path>) -> Result<Palette> {
    let Some(path) = path else {
        return Ok(Palette::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let overrides: HashMap<String, String> =
        serde_json::from_str(&json).with_context(|| format!("failed to parse palette {}", path.display()))?;
    Ok(Palette::with_overrides(&overrides))
}

fn lay_out(path: &Path, config: &LayoutConfig) -> Result<Diagram> {
    let graph = load_graph(path)?;
    info!(path = %path.display(), nodes = graph.node_count(), "laying out graph");
    layout_graph(&graph, config).with_context(|| format!("failed to lay out {}", path.display()))
}

fn print_summary(diagram: &Diagram) {
    let unclear = diagram.edges.iter().filter(|edge| !edge.clear).count();
    println!(
        "{}: {} nodes, {} connectors, {} subsections",
        diagram.title,
        diagram.nodes.len(),
        diagram.edges.len(),
        diagram.subsections.len()
    );
    if unclear > 0 {
        println!("  {unclear} connector(s) cross unrelated nodes");
    }
    if !diagram.degraded.is_empty() {
        println!("  best-effort placement for: {}", diagram.degraded.join(", "));
    }
}
