mod app;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dmsms_graph::config::EngineConfig;
use dmsms_graph::engine::physics::Dimension;
use dmsms_graph::graph::source::{FallbackSpec, load_inference_result};

/// Interactive force-directed explorer for DMSMS knowledge graphs.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// `{nodes, links}` JSON file. Without it a synthetic graph is shown.
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Narrow the graph to the node matching this id or label and its neighbours.
    #[arg(long)]
    topic: Option<String>,

    /// Engine tuning file (JSON). Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Inference result whose related nodes should be focused after loading.
    #[arg(long)]
    related: Option<PathBuf>,

    /// Override the working-subset size.
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Start in the 3D view.
    #[arg(long)]
    three_d: bool,

    /// Seed for the synthetic fallback graph.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Size of the synthetic fallback graph.
    #[arg(long, default_value_t = 160)]
    synthetic_nodes: usize,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = EngineConfig::load(args.config.as_deref())?;
    if let Some(max_nodes) = args.max_nodes {
        config.subset.max_nodes = max_nodes.max(1);
    }

    let related = match &args.related {
        Some(path) => load_inference_result(path)?.related_nodes,
        None => Vec::new(),
    };

    let options = app::LaunchOptions {
        graph_path: args.graph,
        topic: args.topic,
        related,
        fallback: FallbackSpec {
            seed: args.seed,
            node_count: args.synthetic_nodes,
        },
        dimension: if args.three_d {
            Dimension::Three
        } else {
            Dimension::Two
        },
        config,
    };
    info!(
        graph = ?options.graph_path,
        dimension = ?options.dimension,
        max_nodes = options.config.subset.max_nodes,
        "starting viewer"
    );

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "DMSMS graph",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::DmsmsGraphApp::new(cc, options)))),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}
