//! Production line flow planner
//!
//! Compiles optimizer solutions into material-flow graphs, gauges and
//! resource bars.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use flow_planner::adapters::SankeyInput;
use flow_planner::flow_graph::{BuildOptions, FlowGraph, FlowGraphBuilder, FlowNode, RawBypass};
use flow_planner::resource_usage::resource_usage;
use flow_planner::throughput::{self, RecipeGroup};
use flow_planner::view::prepare_view;
use flow_planner::{ProductionLineSolution, ResourceCatalog, db};

#[derive(Parser)]
#[command(name = "flow-planner")]
#[command(about = "Material-flow graphs for production line solutions")]
struct Cli {
    /// Path to the SQLite catalog database
    #[arg(short, long, default_value = "planner_catalog.db")]
    database: PathBuf,

    /// Leftover at or below this fraction of gross output is treated as zero
    #[arg(long, default_value = "0.01")]
    leftover_threshold: f64,

    /// How needs for raw-available items that are also made in-line are met
    #[arg(long, default_value = "exclusive")]
    raw_bypass: RawBypass,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Sankey,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Store the built-in raw resource catalog
    LoadCatalog,

    /// List raw resources in the catalog
    ListResources,

    /// Build the flow graph for an optimizer solution
    Graph {
        /// Solution JSON as returned by the optimizer
        solution: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show throughput gauges per recipe group
    Gauges {
        solution: PathBuf,

        /// JSON list of recipe groups ({name, standard, alternates})
        groups: PathBuf,
    },

    /// Show raw resource usage against global limits
    Usage { solution: PathBuf },

    /// Build every solution JSON under a directory and summarize
    Batch { dir: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    let options = BuildOptions {
        leftover_threshold: cli.leftover_threshold,
        raw_bypass: cli.raw_bypass,
        ..BuildOptions::default()
    };

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadCatalog => {
            let count = db::seed_builtin_catalog(&conn)?;
            println!("Loaded {} raw resources", count);
        }

        Commands::ListResources => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.is_empty() {
                println!("No resources in catalog. Run 'load-catalog' first.");
            } else {
                println!("{:>6} {:<16} {:>16} {:>8}", "Id", "Resource", "Limit (/min)", "Color");
                println!("{}", "-".repeat(49));
                for (id, meta) in catalog.entries() {
                    println!(
                        "{:>6} {:<16} {:>16.0} {:>8}",
                        id.0, meta.display_name, meta.global_limit, meta.color
                    );
                }
            }
        }

        Commands::Graph { solution, format } => {
            let solution = load_solution(&solution)?;
            let catalog = stored_catalog(&conn)?;
            let view = prepare_view(Some(&solution), catalog.as_ref(), options);
            if view.processing {
                println!(
                    "Nothing to render: the solution has no recipes, raw usage or targets, \
                     or the catalog is empty (run 'load-catalog')."
                );
                return Ok(());
            }

            match format {
                OutputFormat::Text => print!("{}", format_flow_graph(&view.graph)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view.graph)?),
                OutputFormat::Sankey => println!(
                    "{}",
                    serde_json::to_string_pretty(&SankeyInput::from_graph(&view.graph))?
                ),
            }
        }

        Commands::Gauges { solution, groups } => {
            let solution = load_solution(&solution)?;
            let groups: Vec<RecipeGroup> = serde_json::from_str(
                &fs::read_to_string(&groups)
                    .with_context(|| format!("Failed to read {}", groups.display()))?,
            )
            .context("Malformed recipe groups")?;

            let selections = throughput::select_active(&solution, &groups);
            let gauges = throughput::normalize(&solution, &selections);

            println!(
                "{:<28} {:>12} {:>12} {:>8} {:>8}",
                "Group", "Total/min", "Output/min", "Flow", "Output"
            );
            println!("{}", "-".repeat(72));
            for g in gauges {
                println!(
                    "{:<28} {:>12.3} {:>12.3} {:>8.3} {:>8.3}",
                    g.group, g.total_throughput, g.output_throughput, g.throughput_gauge, g.output_gauge
                );
            }
        }

        Commands::Usage { solution } => {
            let solution = load_solution(&solution)?;
            let Some(catalog) = stored_catalog(&conn)? else {
                println!("No resources in catalog. Run 'load-catalog' first.");
                return Ok(());
            };

            println!("{:<16} {:>12} {:>12} {:>8}", "Resource", "Used/min", "Limit/min", "Share");
            println!("{}", "-".repeat(51));
            for bar in resource_usage(&solution, &catalog) {
                println!(
                    "{:<16} {:>12.3} {:>12.0} {:>7.1}%",
                    bar.name,
                    bar.quantity,
                    bar.limit,
                    bar.fraction * 100.0
                );
            }
        }

        Commands::Batch { dir } => {
            let catalog = stored_catalog(&conn)?;
            let mut builder = FlowGraphBuilder::new(options);
            if let Some(catalog) = &catalog {
                builder = builder.with_catalog(catalog);
            }

            let mut built = 0;
            for path in find_solution_files(&dir) {
                match ProductionLineSolution::from_path(&path) {
                    Ok(solution) => {
                        let graph = builder.build(&solution);
                        built += 1;
                        println!(
                            "{}: {} nodes, {} edges, {} warnings",
                            path.display(),
                            graph.nodes.len(),
                            graph.edges.len(),
                            graph.warnings.len()
                        );
                    }
                    Err(e) => println!("{}: {}", path.display(), e),
                }
            }
            println!("\nBuilt {} graph(s)", built);
        }
    }

    Ok(())
}

fn load_solution(path: &Path) -> Result<ProductionLineSolution> {
    ProductionLineSolution::from_path(path)
        .with_context(|| format!("Failed to load solution {}", path.display()))
}

fn stored_catalog(conn: &Connection) -> Result<Option<ResourceCatalog>> {
    let catalog = db::load_catalog(conn)?;
    Ok((!catalog.is_empty()).then_some(catalog))
}

/// All `*.json` files under `dir`, in path order
fn find_solution_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

/// Format a flow graph as a readable listing
fn format_flow_graph(graph: &FlowGraph) -> String {
    let mut output = String::new();

    output.push_str("Nodes:\n");
    for node in &graph.nodes {
        let rate = match node {
            FlowNode::Recipe { building, .. } => format!(
                "x{:.3}{}",
                node.rate(),
                building.as_deref().map(|b| format!(" in {}", b)).unwrap_or_default()
            ),
            _ => format!("{:.3}/min", node.rate()),
        };
        output.push_str(&format!("  {:<16} {:<32} {}\n", node.key().to_string(), node.name(), rate));
    }

    output.push_str("\nFlows:\n");
    for edge in &graph.edges {
        output.push_str(&format!(
            "  {:<16} -> {:<16} item {:>5} @ {:.3}/min\n",
            edge.source.to_string(),
            edge.target.to_string(),
            edge.item.0,
            edge.quantity
        ));
    }

    if !graph.warnings.is_empty() {
        output.push_str("\nWarnings:\n");
        for warning in &graph.warnings {
            output.push_str(&format!("  {}\n", warning));
        }
    }

    output
}
