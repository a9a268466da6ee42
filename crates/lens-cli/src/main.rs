mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use lens_core::graph::{GraphStore, NodeQuery};
use lens_core::{
    open_store, Direction, LensConfig, NodeKind, PatternCatalog, QueryEngine, ViewConfig,
    ViewService, ViewType,
};

use serve::{CircleLayout, ServeConfig, SigmaFormatter};

#[derive(Parser)]
#[command(name = "lens")]
#[command(about = "Query, pattern detection and view projection over semantic code graphs", long_about = None)]
struct Cli {
    /// Settings file (default: ./lens.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bundle to load before running the command (repeatable)
    #[arg(short, long = "bundle", global = true)]
    bundles: Vec<PathBuf>,

    /// Extra pattern catalog, JSON or YAML (repeatable)
    #[arg(long = "catalog", global = true)]
    catalogs: Vec<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a bundle into the configured store
    Load {
        /// Bundle file
        path: PathBuf,
    },
    /// Show node and edge counts
    Stats,
    /// Run a structural query
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },
    /// Detect architectural patterns
    Patterns {
        /// Print the explanation of every match
        #[arg(long)]
        explain: bool,
    },
    /// Compute a view projection
    View {
        /// call_graph, inheritance, module_deps, full or neighborhood
        view_type: ViewType,
        /// Root node (repeatable)
        #[arg(long = "root")]
        roots: Vec<String>,
        #[arg(long)]
        depth: Option<usize>,
        /// Node kind filter (repeatable)
        #[arg(long = "kind")]
        kinds: Vec<NodeKind>,
        #[arg(long)]
        file_prefix: Option<String>,
        #[arg(long)]
        min_confidence: Option<f64>,
        /// Overlay pattern matches
        #[arg(long)]
        patterns: bool,
    },
    /// Start the HTTP view server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Shortest path between two nodes
    Path {
        from: String,
        to: String,
        /// Follow edges in both directions
        #[arg(long)]
        undirected: bool,
    },
    /// Connected component of a node
    Component { node: String },
    /// Nodes calling a node
    Callers { node: String },
    /// Nodes a node calls
    Callees { node: String },
    /// Call-only subgraph
    Callgraph {
        #[arg(long = "root")]
        roots: Vec<String>,
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Nodes without edges
    Orphans,
    /// Nodes within a number of hops
    Neighbors {
        node: String,
        #[arg(long, default_value_t = 1)]
        hops: usize,
    },
    /// Find nodes by attribute
    Find {
        #[arg(long)]
        kind: Option<NodeKind>,
        #[arg(long)]
        route: Option<String>,
        #[arg(long)]
        file: Option<String>,
        /// Regular expression on the node name
        #[arg(long)]
        name: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "lens=debug,lens_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => LensConfig::from_file(path)?,
        None => LensConfig::load()?,
    };

    let store = open_store(&config.store);
    store.connect().await?;

    let result = run(cli, &config, store.clone()).await;
    store.close().await?;
    result
}

async fn run(cli: Cli, config: &LensConfig, store: Arc<dyn GraphStore>) -> Result<()> {
    let mut catalog = PatternCatalog::new();
    for path in &cli.catalogs {
        catalog.merge(PatternCatalog::from_file(path)?);
    }

    let service = ViewService::new(
        store.clone(),
        config,
        Arc::new(CircleLayout::default()),
        Arc::new(SigmaFormatter),
    )
    .with_catalog(catalog);

    for path in &cli.bundles {
        service.load_bundle_file(path).await?;
    }

    match cli.command {
        Commands::Load { path } => {
            let summary = service.load_bundle_file(&path).await?;
            println!("Loaded {}", path.display());
            println!("  Nodes: {} loaded, {} skipped", summary.nodes_loaded, summary.nodes_skipped);
            println!("  Edges: {} loaded, {} skipped", summary.edges_loaded, summary.edges_skipped);
            println!("  Patterns in catalog: {}", service.catalog().len());
        }
        Commands::Stats => {
            let stats = store.stats().await?;
            println!("Backend: {}", store.backend());
            println!("Nodes: {}", stats.node_count);
            for (kind, count) in &stats.nodes_by_kind {
                println!("  {:<12} {}", kind, count);
            }
            println!("Edges: {}", stats.edge_count);
            for (kind, count) in &stats.edges_by_kind {
                println!("  {:<12} {}", kind, count);
            }
        }
        Commands::Query { query } => {
            let engine = QueryEngine::with_families(store.clone(), config.graph.edge_families());
            run_query(&engine, store.as_ref(), query).await?;
        }
        Commands::Patterns { explain } => {
            let matches = service.detect_patterns().await?;
            if matches.is_empty() {
                println!("No pattern matches ({} patterns in catalog).", service.catalog().len());
            }
            for (rank, m) in matches.iter().enumerate() {
                println!(
                    "{}#{}  {:.2}  {}",
                    m.pattern,
                    rank + 1,
                    m.confidence,
                    m.node_ids().join(", ")
                );
                if explain {
                    println!("{}\n", m.explain);
                }
            }
        }
        Commands::View {
            view_type,
            roots,
            depth,
            kinds,
            file_prefix,
            min_confidence,
            patterns,
        } => {
            let view = ViewConfig {
                view_type,
                kinds: (!kinds.is_empty()).then_some(kinds),
                file_prefix,
                min_confidence,
                root_ids: (!roots.is_empty()).then_some(roots),
                max_depth: depth,
                include_patterns: patterns,
            };
            let response = service.compute_view(&view).await?;
            print_json(&response)?;
        }
        Commands::Serve { host, port } => {
            let serve_config = ServeConfig {
                host: host.unwrap_or_else(|| config.server.host.clone()),
                port: port.unwrap_or(config.server.port),
            };
            serve::start_server(Arc::new(service), serve_config).await?;
        }
    }

    Ok(())
}

async fn run_query(engine: &QueryEngine, store: &dyn GraphStore, query: QueryCommand) -> Result<()> {
    match query {
        QueryCommand::Path { from, to, undirected } => {
            let direction = if undirected {
                Direction::Undirected
            } else {
                Direction::Directed
            };
            match engine.get_path(&from, &to, direction).await? {
                Some(path) => print_json(&path)?,
                None => return Err(eyre!("no path from {} to {}", from, to)),
            }
        }
        QueryCommand::Component { node } => {
            print_json(&engine.get_connected_component(&node).await?)?;
        }
        QueryCommand::Callers { node } => print_json(&engine.get_callers(&node).await?)?,
        QueryCommand::Callees { node } => print_json(&engine.get_callees(&node).await?)?,
        QueryCommand::Callgraph { roots, depth } => {
            let roots = (!roots.is_empty()).then_some(roots);
            let subgraph = engine.get_call_graph(roots.as_deref(), depth).await?;
            print_json(&subgraph)?;
        }
        QueryCommand::Orphans => print_json(&engine.find_orphan_nodes().await?)?,
        QueryCommand::Neighbors { node, hops } => {
            let reached: Vec<_> = engine
                .find_connected_nodes(&node, Some(hops))
                .await?
                .into_iter()
                .map(|(node, distance)| json!({"distance": distance, "node": node}))
                .collect();
            print_json(&reached)?;
        }
        QueryCommand::Find {
            kind,
            route,
            file,
            name,
        } => {
            let mut query = NodeQuery::new();
            query.kind = kind;
            query.route = route;
            query.file = file;
            query.name_pattern = name;
            print_json(&store.get_nodes_by_query(&query).await?)?;
        }
    }
    Ok(())
}
