use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tetrad_store::config::engine_with_profiles;
use tetrad_store::{BackupManager, ConceptStore, QueryEngine, RelationshipDiscovery, SearchHit};

#[derive(Parser)]
#[command(name = "tetrad", about = "Four-axis semantic concept store CLI")]
struct Cli {
    /// Database path (overrides TETRAD_DB and the default location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Extra context profiles from a TOML file
    #[arg(long, global = true)]
    contexts: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a concept (idempotent upsert keyed by text + context)
    Store {
        text: String,
        #[arg(long, default_value = "general")]
        context: String,
    },

    /// Look up a stored concept
    Get {
        text: String,
        #[arg(long, default_value = "general")]
        context: String,
    },

    /// Store every line of a file as one batch transaction
    Batch {
        file: PathBuf,
        #[arg(long, default_value = "general")]
        context: String,
    },

    /// Semantic search for the nearest concepts to a query text
    Query {
        text: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Concepts within a radius of a stored concept's coordinates
    Near {
        text: String,
        #[arg(long, default_value = "general")]
        context: String,
        #[arg(long, default_value_t = 0.5)]
        radius: f64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Concepts at or above a resonance threshold
    Resonance {
        #[arg(long, default_value_t = 0.5)]
        min: f64,
        #[arg(long)]
        context: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Concepts nearest a named anchor
    Anchor {
        name: String,
        #[arg(long, default_value_t = 2.0)]
        radius: f64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Discover nearest-neighbor relationships
    Discover {
        #[arg(long)]
        context: Option<String>,
        #[arg(long, default_value_t = 0.5)]
        max_distance: f64,
        #[arg(long, default_value_t = 5)]
        max_relationships: usize,
    },

    /// Cluster concepts into connected components
    Clusters {
        #[arg(long)]
        context: Option<String>,
        #[arg(long, default_value_t = 0.5)]
        max_distance: f64,
        #[arg(long, default_value_t = 2)]
        min_size: usize,
    },

    /// Backup operations
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Export every logical table to a JSON file
    Export { path: PathBuf },

    /// Replace the store contents from a JSON export
    Import { path: PathBuf },

    /// Score and store a sacred number
    Sacred { value: f64 },

    /// Show store statistics
    Stats,
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Write a consistent snapshot of the store
    Create {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Check that a backup file is structurally sound
    Verify { path: PathBuf },
    /// Replace the live store from a backup file
    Restore { path: PathBuf },
    /// Timestamped backup with rotation
    Auto {
        dir: PathBuf,
        #[arg(long, default_value_t = 5)]
        keep: usize,
    },
}

fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("TETRAD_DB") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    home.join(".tetrad").join("tetrad.db")
}

fn open_store(cli: &Cli) -> Result<ConceptStore> {
    let path = cli.db.clone().unwrap_or_else(default_db_path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let store = match &cli.contexts {
        Some(profiles) => {
            let engine = engine_with_profiles(profiles)
                .with_context(|| format!("failed to load profiles from {}", profiles.display()))?;
            ConceptStore::open_with_engine(&path, engine)
        }
        None => ConceptStore::open(&path),
    };
    store.with_context(|| format!("failed to open store at {}", path.display()))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Store { text, context } => cmd_store(&cli, text, context),
        Commands::Get { text, context } => cmd_get(&cli, text, context),
        Commands::Batch { file, context } => cmd_batch(&cli, file, context),
        Commands::Query { text, limit } => cmd_query(&cli, text, *limit),
        Commands::Near {
            text,
            context,
            radius,
            limit,
        } => cmd_near(&cli, text, context, *radius, *limit),
        Commands::Resonance { min, context, limit } => {
            cmd_resonance(&cli, *min, context.as_deref(), *limit)
        }
        Commands::Anchor { name, radius, limit } => cmd_anchor(&cli, name, *radius, *limit),
        Commands::Discover {
            context,
            max_distance,
            max_relationships,
        } => cmd_discover(&cli, context.as_deref(), *max_distance, *max_relationships),
        Commands::Clusters {
            context,
            max_distance,
            min_size,
        } => cmd_clusters(&cli, context.as_deref(), *max_distance, *min_size),
        Commands::Backup(backup) => cmd_backup(&cli, backup),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path } => cmd_import(&cli, path),
        Commands::Sacred { value } => cmd_sacred(&cli, *value),
        Commands::Stats => cmd_stats(&cli),
    }
}

fn print_hits(hits: &[SearchHit], metric_name: &str) {
    if hits.is_empty() {
        println!("(no matches)");
        return;
    }
    for hit in hits {
        let c = hit.concept.coordinate;
        println!(
            "{} ({})  {metric_name}={:.4}  [{:.3}, {:.3}, {:.3}, {:.3}]",
            hit.concept.text,
            hit.concept.context,
            hit.metric,
            c.love,
            c.justice,
            c.power,
            c.wisdom,
        );
    }
}

fn cmd_store(cli: &Cli, text: &str, context: &str) -> Result<()> {
    let store = open_store(cli)?;
    let id = store
        .store(text, context)
        .context("failed to store concept")?;
    if let Some(concept) = store.get(text, context).context("failed to read back")? {
        let c = concept.coordinate;
        println!(
            "stored #{id}: [{:.3}, {:.3}, {:.3}, {:.3}]  resonance={:.4}",
            c.love,
            c.justice,
            c.power,
            c.wisdom,
            concept.resonance()
        );
    }
    Ok(())
}

fn cmd_get(cli: &Cli, text: &str, context: &str) -> Result<()> {
    let store = open_store(cli)?;
    match store.get(text, context).context("lookup failed")? {
        Some(concept) => {
            let c = concept.coordinate;
            println!(
                "#{}: [{:.3}, {:.3}, {:.3}, {:.3}]  resonance={:.4}  balance={:.4}",
                concept.id,
                c.love,
                c.justice,
                c.power,
                c.wisdom,
                concept.resonance(),
                concept.balance()
            );
        }
        None => println!("(not found)"),
    }
    Ok(())
}

fn cmd_batch(cli: &Cli, file: &PathBuf, context: &str) -> Result<()> {
    let store = open_store(cli)?;
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let items: Vec<(&str, &str)> = lines.iter().map(|l| (*l, context)).collect();

    let ids = store.batch_store(&items).context("batch store failed")?;
    println!("stored {} concepts in one transaction", ids.len());
    Ok(())
}

fn cmd_query(cli: &Cli, text: &str, limit: usize) -> Result<()> {
    let store = open_store(cli)?;
    let hits = QueryEngine::new(&store)
        .semantic_search(text, limit)
        .context("semantic search failed")?;
    print_hits(&hits, "score");

    if cli.verbose {
        let c = store
            .engine()
            .calculate_coordinates(text, tetrad_core::DEFAULT_CONTEXT);
        eprintln!(
            "--- query coordinate: [{:.3}, {:.3}, {:.3}, {:.3}] ---",
            c.love, c.justice, c.power, c.wisdom
        );
    }
    Ok(())
}

fn cmd_near(cli: &Cli, text: &str, context: &str, radius: f64, limit: usize) -> Result<()> {
    let store = open_store(cli)?;
    let Some(concept) = store.get(text, context).context("lookup failed")? else {
        println!("(not found: store it first)");
        return Ok(());
    };
    let hits = QueryEngine::new(&store)
        .proximity_search(concept.coordinate, radius, None, limit)
        .context("proximity search failed")?;
    print_hits(&hits, "distance");
    Ok(())
}

fn cmd_resonance(cli: &Cli, min: f64, context: Option<&str>, limit: usize) -> Result<()> {
    let store = open_store(cli)?;
    let hits = QueryEngine::new(&store)
        .resonance_search(min, context, limit)
        .context("resonance search failed")?;
    print_hits(&hits, "resonance");
    Ok(())
}

fn cmd_anchor(cli: &Cli, name: &str, radius: f64, limit: usize) -> Result<()> {
    let store = open_store(cli)?;
    let hits = QueryEngine::new(&store)
        .anchor_search(name, radius, limit)
        .context("anchor search failed")?;
    print_hits(&hits, "distance");
    Ok(())
}

fn cmd_discover(
    cli: &Cli,
    context: Option<&str>,
    max_distance: f64,
    max_relationships: usize,
) -> Result<()> {
    let store = open_store(cli)?;
    let added = RelationshipDiscovery::new(&store)
        .discover(context, max_distance, max_relationships)
        .context("relationship discovery failed")?;
    println!("discovered {added} new relationships");
    Ok(())
}

fn cmd_clusters(
    cli: &Cli,
    context: Option<&str>,
    max_distance: f64,
    min_size: usize,
) -> Result<()> {
    let store = open_store(cli)?;
    let clusters = RelationshipDiscovery::new(&store)
        .clusters(context, max_distance, min_size)
        .context("clustering failed")?;

    if clusters.is_empty() {
        println!("(no clusters)");
        return Ok(());
    }
    for (i, cluster) in clusters.iter().enumerate() {
        let c = cluster.centroid;
        println!(
            "cluster {i}: {} members, centroid [{:.3}, {:.3}, {:.3}, {:.3}]",
            cluster.members.len(),
            c.love,
            c.justice,
            c.power,
            c.wisdom,
        );
    }
    Ok(())
}

fn cmd_backup(cli: &Cli, command: &BackupCommands) -> Result<()> {
    let store = open_store(cli)?;
    let backups = BackupManager::new(&store);

    match command {
        BackupCommands::Create { path } => {
            let written = backups
                .create_backup(path.as_deref())
                .context("backup failed")?;
            println!("backup written to {}", written.display());
        }
        BackupCommands::Verify { path } => {
            if backups.verify_backup(path) {
                println!("ok: {}", path.display());
            } else {
                println!("INVALID: {}", path.display());
                std::process::exit(1);
            }
        }
        BackupCommands::Restore { path } => {
            backups.restore_from_backup(path).context("restore failed")?;
            println!("restored from {}", path.display());
        }
        BackupCommands::Auto { dir, keep } => {
            let written = backups.auto_backup(dir, *keep).context("auto backup failed")?;
            println!("backup written to {} (keeping {keep})", written.display());
        }
    }
    Ok(())
}

fn cmd_export(cli: &Cli, path: &PathBuf) -> Result<()> {
    let store = open_store(cli)?;
    BackupManager::new(&store)
        .export_to_json_file(path)
        .context("export failed")?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &PathBuf) -> Result<()> {
    let store = open_store(cli)?;
    BackupManager::new(&store)
        .restore_from_json_file(path)
        .context("import failed")?;
    let stats = store.stats().context("stats failed")?;
    println!(
        "imported from {}. concepts={}, relationships={}",
        path.display(),
        stats.concepts,
        stats.relationships
    );
    Ok(())
}

fn cmd_sacred(cli: &Cli, value: f64) -> Result<()> {
    let store = open_store(cli)?;
    store
        .store_sacred_number(value)
        .context("failed to store sacred number")?;
    if let Some(record) = store.get_sacred_number(value).context("failed to read back")? {
        println!(
            "{}: sacred={} resonance={:.4}",
            record.value, record.is_sacred, record.resonance
        );
    }
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let stats = store.stats().context("stats failed")?;

    println!("concepts:       {}", stats.concepts);
    println!("relationships:  {}", stats.relationships);
    println!("sacred numbers: {}", stats.sacred_numbers);
    println!("anchors:        {}", stats.anchors);
    for (context, count) in &stats.by_context {
        println!("  {context}: {count}");
    }
    Ok(())
}
