//! TraitGraph - genetic correlation neighbors for a trait
//!
//! A CLI that loads heritability and genetic correlation tables, resolves a
//! trait query and reports its meta-analyzed heritability, its prioritized
//! neighbors and the study-level evidence behind each edge.
//!
//! Exit codes:
//!   0 - Success (including queries that matched nothing)
//!   1 - Runtime error (missing table, unreadable file, bad config, etc.)

mod cli;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use traitgraph::config::{Config, CONFIG_FILE};
use traitgraph::loader::{self, LoadOptions};
use traitgraph::report::{self, QueryReport, ReportMetadata};
use traitgraph::{KnowledgeGraphService, StaticSynonyms};

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    init_logging(&args);

    info!("TraitGraph v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_query(args) {
        error!("Query failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Handle --init-config: generate a default .traitgraph.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        bail!("{} already exists. Remove it first or edit it manually.", CONFIG_FILE);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to point at your tables and tune the thresholds.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one query end to end and write the report.
fn run_query(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    args.apply_to(&mut config);

    let heritability_path = required_table(config.data.heritability.as_deref(), "heritability")?;
    let correlation_path = required_table(config.data.correlations.as_deref(), "correlations")?;

    let options = LoadOptions {
        delimiter: config.data.delimiter_byte(),
        show_progress: !args.quiet,
    };

    let heritability = loader::load_heritability(&heritability_path, &options)
        .with_context(|| format!("Failed to load heritability table {}", heritability_path.display()))?;
    let correlations = loader::load_correlations(&correlation_path, &options)
        .with_context(|| format!("Failed to load correlation table {}", correlation_path.display()))?;

    let service = KnowledgeGraphService::with_settings(heritability, correlations, config.build.settings());
    let stats = service.warm_up();

    let metadata = ReportMetadata {
        generated_at: Utc::now(),
        heritability_source: heritability_path.display().to_string(),
        correlation_source: correlation_path.display().to_string(),
        rg_z_threshold: config.query.rg_z_threshold,
        h2_z_threshold: config.query.h2_z_threshold,
        stats,
    };

    let query = args.query();
    let report = match args.target.as_deref() {
        Some(target) => edge_report(&service, metadata, query, target),
        None => neighbor_report(&service, &config, &args, metadata, query),
    };

    if report.resolution.resolved_trait_id.is_none() && report.alternatives.is_empty() {
        warn!("No trait found for '{}'", query);
    }

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match config.general.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                print_summary(&report, start_time);
                println!("\n✅ Report saved to: {}", path.display());
            }
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// Rank the neighbors of the query and its alternatives.
fn neighbor_report(
    service: &KnowledgeGraphService,
    config: &Config,
    args: &Args,
    metadata: ReportMetadata,
    query: &str,
) -> QueryReport {
    let synonyms = StaticSynonyms::new(&config.synonyms);

    let mut expanded = service.expand_neighbors(
        query,
        &synonyms,
        &args.alt,
        config.query.rg_z_threshold,
        config.query.h2_z_threshold,
    );
    expanded.neighbors.truncate(config.query.max_neighbors);

    let first_resolved = expanded.resolved_trait_ids().first().map(|id| id.to_string());

    let provenance: Vec<_> = expanded
        .neighbors
        .iter()
        .take(config.query.provenance_top)
        .filter_map(|neighbor| {
            let source = expanded.source_of(&neighbor.trait_id)?;
            service.get_edge_provenance(source, &neighbor.trait_id)
        })
        .collect();

    let mut resolutions = expanded.resolutions.into_iter();
    let resolution = resolutions
        .next()
        .unwrap_or_else(|| service.resolve_trait_id(query));

    let mut report = QueryReport::new(metadata, resolution);
    report.alternatives = resolutions.collect();
    report.trait_node = first_resolved.and_then(|id| service.get_trait_node(&id));
    report.neighbors = expanded.neighbors;
    report.provenance = provenance;
    report
}

/// Explain the single edge between the query and a target trait.
fn edge_report(
    service: &KnowledgeGraphService,
    metadata: ReportMetadata,
    query: &str,
    target: &str,
) -> QueryReport {
    let source = service.resolve_trait_id(query);
    let target = service.resolve_trait_id(target);

    let mut report = QueryReport::new(metadata, source);
    report.trait_node = report.trait_id().and_then(|id| service.get_trait_node(id));

    let source_id = report.resolution.resolved_trait_id.clone();
    if let (Some(source_id), Some(target_id)) = (source_id, target.resolved_trait_id.as_deref()) {
        match service.get_edge_provenance(&source_id, target_id) {
            Some(power) => report.provenance.push(power),
            None => warn!("No usable correlation between {} and {}", source_id, target_id),
        }
    } else if target.resolved_trait_id.is_none() {
        warn!("No trait found for target '{}'", target.query);
    }

    report
}

fn print_summary(report: &QueryReport, start_time: Instant) {
    println!("\n📊 Query Summary:");
    match report.trait_id() {
        Some(id) => println!("   Trait: {} ({})", id, report.resolution.method),
        None => println!("   Trait: not found for '{}'", report.resolution.query),
    }
    if let Some(ref node) = report.trait_node {
        if let Some(h2) = node.h2_meta {
            println!("   h2: {:.4} from {} studies", h2, node.n_valid);
        }
    }
    println!("   Neighbors: {}", report.neighbors.len());
    println!("   Edges explained: {}", report.provenance.len());
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
}

fn required_table(path: Option<&Path>, key: &str) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => bail!(
            "No {} table given. Pass --{} or set `{}` under [data] in {}",
            key,
            key,
            key,
            CONFIG_FILE
        ),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
