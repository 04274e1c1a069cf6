//! seshat CLI: data lineage and provenance engine.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use seshat::chain::{ChainClass, ChainId};
use seshat::config::SeshatConfig;
use seshat::engine::{Engine, EngineConfig};
use seshat::metadata::MetaMap;
use seshat::paths::SeshatPaths;
use seshat::transform::TransformId;

#[derive(Parser)]
#[command(name = "seshat", version, about = "Data lineage and provenance engine")]
struct Cli {
    /// Data directory for persistent storage (overrides config).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Run without persistence (nothing survives this invocation).
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the seshat directories and default config.
    Init,

    /// Record a derivation edge between two artifacts.
    Add {
        /// Upstream artifact name.
        parent: String,
        /// Downstream artifact name.
        child: String,
        /// Relationship kind.
        #[arg(long)]
        kind: Option<String>,
        /// Edge weight.
        #[arg(long, default_value = "1.0")]
        weight: f64,
    },

    /// List everything upstream of an artifact.
    Ancestors {
        /// Artifact name.
        node: String,
        /// Maximum number of hops.
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// List everything downstream of an artifact.
    Descendants {
        /// Artifact name.
        node: String,
        /// Maximum number of hops.
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Intersect the ancestor sets of several artifacts.
    CommonAncestors {
        /// Artifact names.
        #[arg(required = true)]
        nodes: Vec<String>,
    },

    /// Shortest derivation path between two artifacts.
    Path {
        /// Source artifact name.
        source: String,
        /// Target artifact name.
        target: String,
    },

    /// Manage lineage chains.
    Chain {
        #[command(subcommand)]
        action: ChainAction,
    },

    /// Manage transformations.
    Transform {
        #[command(subcommand)]
        action: TransformAction,
    },

    /// Manage provenance records.
    Provenance {
        #[command(subcommand)]
        action: ProvenanceAction,
    },

    /// Export a chain's subgraph as JSON.
    Export {
        /// Chain id.
        chain: u64,
    },

    /// Show engine info and statistics.
    Info,
}

#[derive(Subcommand)]
enum ChainAction {
    /// Create a chain anchored at the given roots.
    Create {
        /// Chain name.
        name: String,
        /// Root artifact names.
        #[arg(required = true)]
        roots: Vec<String>,
    },
    /// Show a chain.
    Show {
        /// Chain id.
        id: u64,
    },
    /// List all chains.
    List,
    /// Add artifacts to a chain.
    Extend {
        /// Chain id.
        id: u64,
        /// Artifact names to add.
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Replace a chain's declared leaves.
    Leaves {
        /// Chain id.
        id: u64,
        /// Leaf artifact names.
        #[arg(required = true)]
        leaves: Vec<String>,
    },
    /// Replace a chain's declared classification.
    Reclassify {
        /// Chain id.
        id: u64,
        /// New class: linear, branching, merging, or complex.
        class: String,
    },
    /// Compute structural metrics for a chain.
    Analyze {
        /// Chain id.
        id: u64,
    },
}

#[derive(Subcommand)]
enum TransformAction {
    /// Declare a transformation in pending state.
    Declare {
        /// Step name.
        name: String,
        /// Input artifact names.
        #[arg(long, required = true, num_args = 1..)]
        inputs: Vec<String>,
        /// Logical function label (e.g. "dedupe", "join").
        #[arg(long)]
        function: String,
        /// Owning chain id.
        #[arg(long)]
        chain: Option<u64>,
    },
    /// Mark a pending transformation as started.
    Begin {
        /// Transformation id.
        id: u64,
    },
    /// Record successful execution and wire input -> output edges.
    Run {
        /// Transformation id.
        id: u64,
        /// Output artifact name.
        output: String,
        /// Record the outcome only; add no edges.
        #[arg(long)]
        no_link: bool,
    },
    /// Record failed execution.
    Fail {
        /// Transformation id.
        id: u64,
        /// Error message.
        message: String,
    },
    /// Explicitly undo a transformation.
    Rollback {
        /// Transformation id.
        id: u64,
    },
    /// Show a transformation.
    Show {
        /// Transformation id.
        id: u64,
    },
    /// List all transformations.
    List,
}

#[derive(Subcommand)]
enum ProvenanceAction {
    /// Append a provenance record for an artifact.
    Record {
        /// Artifact name.
        node: String,
        /// Provenance kind (e.g. "ingestion", "transformation").
        #[arg(long)]
        kind: String,
        /// External system that produced the data.
        #[arg(long)]
        source: String,
    },
    /// Show an artifact's provenance history, newest first.
    Show {
        /// Artifact name.
        node: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let paths = SeshatPaths::resolve().into_diagnostic()?;
    let file_config = SeshatConfig::load(&paths.config_file()).into_diagnostic()?;

    let mut config = file_config.to_engine_config(&paths);
    if let Some(ref dir) = cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if cli.memory {
        config.data_dir = None;
    }

    match cli.command {
        Commands::Init => {
            paths.ensure_dirs().into_diagnostic()?;
            if !paths.config_file().exists() {
                file_config.save(&paths.config_file()).into_diagnostic()?;
            }
            let engine = Engine::open(config).into_diagnostic()?;
            println!("Initialized seshat at {}", paths.data_dir.display());
            println!("{}", engine.info());
        }

        Commands::Add {
            parent,
            child,
            kind,
            weight,
        } => {
            let engine = Engine::open(config).into_diagnostic()?;
            let kind = kind.unwrap_or(file_config.default_relationship_kind);
            engine
                .add_relationship(&parent, &child, &kind, weight, MetaMap::new())
                .into_diagnostic()?;
            println!("{parent} -[{kind}]-> {child} (weight {weight})");
        }

        Commands::Ancestors { node, max_depth } => {
            let engine = Engine::open(config).into_diagnostic()?;
            print_set(&node, "ancestors", engine.ancestors(&node, max_depth));
        }

        Commands::Descendants { node, max_depth } => {
            let engine = Engine::open(config).into_diagnostic()?;
            print_set(&node, "descendants", engine.descendants(&node, max_depth));
        }

        Commands::CommonAncestors { nodes } => {
            let engine = Engine::open(config).into_diagnostic()?;
            let refs: Vec<&str> = nodes.iter().map(String::as_str).collect();
            let common = engine.common_ancestors(&refs).into_diagnostic()?;
            print_set(&nodes.join(", "), "common ancestors", common);
        }

        Commands::Path { source, target } => {
            let engine = Engine::open(config).into_diagnostic()?;
            match engine.path_between(&source, &target) {
                Some(path) => println!("{}", path.join(" -> ")),
                None => println!("no path from \"{source}\" to \"{target}\""),
            }
        }

        Commands::Chain { action } => {
            let engine = Engine::open(config).into_diagnostic()?;
            run_chain(&engine, action)?;
        }

        Commands::Transform { action } => {
            let engine = Engine::open(config).into_diagnostic()?;
            run_transform(&engine, action)?;
        }

        Commands::Provenance { action } => {
            let engine = Engine::open(config).into_diagnostic()?;
            run_provenance(&engine, action)?;
        }

        Commands::Export { chain } => {
            let engine = Engine::open(config).into_diagnostic()?;
            let diagram = engine.chain_diagram(parse_chain_id(chain)?).into_diagnostic()?;
            let json = serde_json::to_string_pretty(&diagram).into_diagnostic()?;
            println!("{json}");
        }

        Commands::Info => {
            let engine = Engine::open(config).into_diagnostic()?;
            println!("{}", engine.info());
        }
    }

    Ok(())
}

fn run_chain(engine: &Engine, action: ChainAction) -> Result<()> {
    match action {
        ChainAction::Create { name, roots } => {
            let refs: Vec<&str> = roots.iter().map(String::as_str).collect();
            let chain = engine.create_chain(&name, &refs, MetaMap::new()).into_diagnostic()?;
            println!("Created {} \"{}\" with {} root(s)", chain.id, chain.name, chain.root_nodes.len());
        }
        ChainAction::Show { id } => {
            let chain = engine.get_chain(parse_chain_id(id)?).into_diagnostic()?;
            println!("Chain: \"{}\" ({})", chain.name, chain.id);
            println!("  class:    {}", chain.class);
            println!("  members:  {}", chain.len());
            println!("  roots:    {}", names(engine, &chain.root_nodes));
            if !chain.leaf_nodes.is_empty() {
                println!("  leaves:   {}", names(engine, &chain.leaf_nodes));
            }
        }
        ChainAction::List => {
            let chains = engine.list_chains();
            if chains.is_empty() {
                println!("No chains registered.");
            } else {
                println!("Chains ({}):", chains.len());
                for chain in &chains {
                    println!(
                        "  {} \"{}\" [{}] {} member(s)",
                        chain.id,
                        chain.name,
                        chain.class,
                        chain.len()
                    );
                }
            }
        }
        ChainAction::Extend { id, nodes } => {
            let refs: Vec<&str> = nodes.iter().map(String::as_str).collect();
            let chain = engine.extend_chain(parse_chain_id(id)?, &refs).into_diagnostic()?;
            println!("{} now has {} member(s)", chain.id, chain.len());
        }
        ChainAction::Leaves { id, leaves } => {
            let refs: Vec<&str> = leaves.iter().map(String::as_str).collect();
            let chain = engine.set_chain_leaves(parse_chain_id(id)?, &refs).into_diagnostic()?;
            println!("{} leaves: {}", chain.id, names(engine, &chain.leaf_nodes));
        }
        ChainAction::Reclassify { id, class } => {
            let class = parse_class(&class)?;
            let chain = engine.reclassify_chain(parse_chain_id(id)?, class).into_diagnostic()?;
            println!("{} class: {}", chain.id, chain.class);
        }
        ChainAction::Analyze { id } => {
            let s = engine.analyze_chain(parse_chain_id(id)?);
            println!("Chain structure:");
            println!("  nodes:            {}", s.total_nodes);
            println!("  edges:            {}", s.total_edges);
            println!("  roots:            {}", s.root_count);
            println!("  leaves:           {}", s.leaf_count);
            println!("  max depth:        {}", s.max_depth);
            println!("  branching factor: {:.3}", s.branching_factor);
            println!("  density:          {:.3}", s.density);
            println!("  is DAG:           {}", s.is_dag);
            println!("  components:       {}", s.connected_components);
            println!("  suggested class:  {}", s.suggested_class);
        }
    }
    Ok(())
}

fn run_transform(engine: &Engine, action: TransformAction) -> Result<()> {
    match action {
        TransformAction::Declare {
            name,
            inputs,
            function,
            chain,
        } => {
            let refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
            let chain = chain.map(parse_chain_id).transpose()?;
            let t = engine
                .declare_transformation(&name, &refs, &function, MetaMap::new(), chain, MetaMap::new())
                .into_diagnostic()?;
            println!("Declared {} \"{}\" ({} input(s), {})", t.id, t.name, t.inputs.len(), t.status);
        }
        TransformAction::Begin { id } => {
            let t = engine.begin_transformation(parse_transform_id(id)?).into_diagnostic()?;
            println!("{} is {}", t.id, t.status);
        }
        TransformAction::Run { id, output, no_link } => {
            let id = parse_transform_id(id)?;
            let t = if no_link {
                engine.execute_transformation(id, &output).into_diagnostic()?
            } else {
                engine.apply_transformation(id, &output).into_diagnostic()?
            };
            println!("{} {} -> \"{output}\"", t.id, t.status);
        }
        TransformAction::Fail { id, message } => {
            let t = engine
                .fail_transformation(parse_transform_id(id)?, &message)
                .into_diagnostic()?;
            println!("{} is {}: {message}", t.id, t.status);
        }
        TransformAction::Rollback { id } => {
            let t = engine.rollback_transformation(parse_transform_id(id)?).into_diagnostic()?;
            println!("{} is {}", t.id, t.status);
        }
        TransformAction::Show { id } => {
            let t = engine.get_transformation(parse_transform_id(id)?).into_diagnostic()?;
            println!("Transformation: \"{}\" ({})", t.name, t.id);
            println!("  function: {}", t.function);
            println!("  status:   {}", t.status);
            println!("  inputs:   {}", names(engine, &t.inputs));
            if let Some(output) = t.output {
                println!("  output:   {}", engine.artifact_name(output));
            }
            if let Some(chain) = t.chain {
                println!("  chain:    {chain}");
            }
            if let Some(ms) = t.duration_ms {
                println!("  duration: {ms} ms");
            }
            if let Some(ref message) = t.error_message {
                println!("  error:    {message}");
            }
        }
        TransformAction::List => {
            let all = engine.transformations();
            if all.is_empty() {
                println!("No transformations declared.");
            } else {
                println!("Transformations ({}):", all.len());
                for t in &all {
                    println!("  {} \"{}\" [{}] {}", t.id, t.name, t.function, t.status);
                }
            }
        }
    }
    Ok(())
}

fn run_provenance(engine: &Engine, action: ProvenanceAction) -> Result<()> {
    match action {
        ProvenanceAction::Record { node, kind, source } => {
            let id = engine
                .record_provenance(&node, &kind, &source, vec![], BTreeMap::new())
                .into_diagnostic()?;
            println!("Recorded {id} for \"{node}\"");
        }
        ProvenanceAction::Show { node } => {
            let history = engine.provenance_of(&node);
            if history.is_empty() {
                println!("No provenance for \"{node}\".");
            } else {
                println!("Provenance for \"{node}\" ({} record(s), newest first):", history.len());
                for record in &history {
                    println!(
                        "  {} [{}] from {} at {}",
                        record.id, record.kind, record.source_system, record.created_at
                    );
                    for tx in &record.transformations {
                        println!("    via {tx}");
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_set(subject: &str, relation: &str, set: HashSet<String>) {
    if set.is_empty() {
        println!("No {relation} for \"{subject}\".");
    } else {
        let mut sorted: Vec<String> = set.into_iter().collect();
        sorted.sort();
        println!("{relation} of \"{subject}\" ({}):", sorted.len());
        for name in sorted {
            println!("  {name}");
        }
    }
}

fn names(engine: &Engine, ids: &[seshat::artifact::ArtifactId]) -> String {
    ids.iter()
        .map(|&id| engine.artifact_name(id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_chain_id(raw: u64) -> Result<ChainId> {
    ChainId::new(raw).ok_or_else(|| miette::miette!("chain id must be nonzero"))
}

fn parse_transform_id(raw: u64) -> Result<TransformId> {
    TransformId::new(raw).ok_or_else(|| miette::miette!("transformation id must be nonzero"))
}

fn parse_class(raw: &str) -> Result<ChainClass> {
    match raw {
        "linear" => Ok(ChainClass::Linear),
        "branching" => Ok(ChainClass::Branching),
        "merging" => Ok(ChainClass::Merging),
        "complex" => Ok(ChainClass::Complex),
        other => Err(miette::miette!(
            "unknown chain class \"{other}\" (expected linear, branching, merging, or complex)"
        )),
    }
}
