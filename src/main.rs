//! # sitekb CLI Application
//!
//! Command-line interface over the knowledge service.
//!
//! ## Subcommands
//!
//! - `ingest`: crawl a site and store its content
//! - `remove`: delete every record of one source
//! - `clear`: delete everything
//! - `sources`: list ingested sources
//! - `browse`: page through stored records
//! - `health`: report whether any knowledge is loaded
//!
//! Every invocation rebuilds the source registry from the store before
//! running its command, so sources survive across runs.

mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sitekb::crawler::{CrawlerConfig, ExtractionStrategy};
use sitekb::index::{KnowledgeStore, LibSqlStore};
use sitekb::registry::SourceRegistry;
use sitekb::service::{KnowledgeService, default_strategies};
use tracing::instrument;

/// Chrome/Chromium binary used when `--chrome-path` is not given
const CHROME_PATH_VAR: &str = "CHROMIUM_PATH";

#[derive(Parser)]
#[command(author, version, about = "Crawl websites into a searchable knowledge store", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Database path
    #[arg(long, global = true, default_value = "sitekb.db")]
    database: PathBuf,

    /// Collection holding the records
    #[arg(long, global = true, default_value = sitekb::index::DEFAULT_COLLECTION)]
    collection: String,

    /// Output format (text|json)
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl a website and add its content to the knowledge store
    Ingest(IngestArgs),

    /// Remove every record ingested from a URL
    Remove(RemoveArgs),

    /// Remove all records and sources
    Clear,

    /// List ingested source URLs
    Sources,

    /// Page through stored records
    Browse(BrowseArgs),

    /// Report whether knowledge is loaded
    Health,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// URL to ingest
    #[arg(required = true)]
    url: String,

    /// Maximum link distance from the URL
    #[arg(short, long, default_value = "3")]
    depth: u32,

    /// Links followed per page
    #[arg(short, long, default_value = "2")]
    links: usize,

    /// Per-page timeout in milliseconds
    #[arg(long, default_value = "30000")]
    timeout_ms: u64,

    /// Wait after page load before reading content, in milliseconds
    #[arg(long, default_value = "2000")]
    settle_ms: u64,

    /// Minimum characters of text for a page to be kept
    #[arg(long, default_value = "50")]
    min_text: usize,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Skip browser rendering and only fetch static HTML
    #[arg(long)]
    no_browser: bool,
}

#[derive(Args, Debug)]
struct RemoveArgs {
    /// Source URL to remove
    #[arg(required = true)]
    url: String,
}

#[derive(Args, Debug)]
struct BrowseArgs {
    /// Number of records to show
    #[arg(short, long, default_value = "100")]
    limit: usize,

    /// Records to skip
    #[arg(short, long, default_value = "0")]
    offset: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let _otel = telemetry::init_tracing_subscriber(cli.global.log_file.as_deref())?;

    let strategies = match &cli.command {
        Commands::Ingest(args) => {
            let config = crawler_config(args);
            default_strategies(&config, !args.no_browser)?
        }
        _ => Vec::new(),
    };
    let service = open_service(&cli.global, strategies).await?;

    match cli.command {
        Commands::Ingest(args) => ingest_command(&service, &cli.global, args).await?,
        Commands::Remove(args) => remove_command(&service, &cli.global, args).await?,
        Commands::Clear => clear_command(&service, &cli.global).await?,
        Commands::Sources => sources_command(&service, &cli.global)?,
        Commands::Browse(args) => browse_command(&service, &cli.global, args).await?,
        Commands::Health => health_command(&service, &cli.global)?,
    }

    Ok(())
}

fn crawler_config(args: &IngestArgs) -> CrawlerConfig {
    let chrome_path = args
        .chrome_path
        .clone()
        .or_else(|| std::env::var_os(CHROME_PATH_VAR).map(PathBuf::from));

    CrawlerConfig::builder()
        .max_depth(args.depth)
        .max_links_per_page(args.links)
        .page_timeout_ms(args.timeout_ms)
        .settle_delay_ms(args.settle_ms)
        .min_text_length(args.min_text)
        .headless(!args.headed)
        .chrome_executable(chrome_path)
        .build()
}

async fn open_service(
    global: &GlobalArgs,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
) -> anyhow::Result<KnowledgeService<LibSqlStore>> {
    let path = global.database.to_string_lossy();
    let store = LibSqlStore::new_from_path(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path))?;

    let service = KnowledgeService::new(
        KnowledgeStore::new(store, global.collection.clone()),
        Arc::new(SourceRegistry::new()),
        strategies,
    );
    service.reconcile_sources().await?;
    Ok(service)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[instrument(skip(service, global))]
async fn ingest_command(
    service: &KnowledgeService<LibSqlStore>,
    global: &GlobalArgs,
    args: IngestArgs,
) -> anyhow::Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]")?);
    spinner.set_message(format!("Ingesting {}...", args.url.trim()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = service.ingest_from_url(&args.url).await;
    spinner.finish_and_clear();
    let report = result?;

    if global.format == "json" {
        return print_json(&report);
    }

    println!(
        "Ingested {} document(s) from {} ({})",
        report.document_count, report.url, report.method
    );
    if let Some(warning) = &report.warning {
        println!("Warning: {}", warning);
    }
    println!("Sources: {}", report.sources.len());
    Ok(())
}

#[instrument(skip(service, global))]
async fn remove_command(
    service: &KnowledgeService<LibSqlStore>,
    global: &GlobalArgs,
    args: RemoveArgs,
) -> anyhow::Result<()> {
    let report = service.remove_url(&args.url).await?;

    if global.format == "json" {
        return print_json(&report);
    }

    println!("Deleted {} record(s) for {}", report.deleted_count, args.url.trim());
    println!("Remaining sources: {}", report.remaining.len());
    for url in &report.remaining {
        println!("  {}", url);
    }
    Ok(())
}

#[instrument(skip(service, global))]
async fn clear_command(
    service: &KnowledgeService<LibSqlStore>,
    global: &GlobalArgs,
) -> anyhow::Result<()> {
    let deleted = service.clear_all().await?;

    if global.format == "json" {
        return print_json(&serde_json::json!({ "deleted_count": deleted }));
    }

    println!("Cleared {} record(s)", deleted);
    Ok(())
}

fn sources_command(
    service: &KnowledgeService<LibSqlStore>,
    global: &GlobalArgs,
) -> anyhow::Result<()> {
    let sources = service.list_sources();

    if global.format == "json" {
        return print_json(&sources);
    }

    println!("Sources: {}", sources.len());
    for url in sources {
        println!("  {}", url);
    }
    Ok(())
}

#[instrument(skip(service, global))]
async fn browse_command(
    service: &KnowledgeService<LibSqlStore>,
    global: &GlobalArgs,
    args: BrowseArgs,
) -> anyhow::Result<()> {
    let page = service.browse_records(args.limit, args.offset).await?;

    if global.format == "json" {
        return print_json(&page);
    }

    println!(
        "Showing {} of {} record(s) (offset {})",
        page.records.len(),
        page.total,
        args.offset
    );
    for record in &page.records {
        let preview: String = record.text_content.chars().take(100).collect();
        println!("[{}] {}", record.id, record.name);
        println!("   Source: {}", record.source_url);
        println!("   {}", preview);
        println!();
    }
    Ok(())
}

fn health_command(
    service: &KnowledgeService<LibSqlStore>,
    global: &GlobalArgs,
) -> anyhow::Result<()> {
    let loaded = service.knowledge_loaded();
    let sources = service.list_sources();

    if global.format == "json" {
        return print_json(&serde_json::json!({
            "status": "healthy",
            "knowledge_loaded": loaded,
            "sources": sources,
        }));
    }

    println!("Status: healthy");
    println!("Knowledge loaded: {}", if loaded { "yes" } else { "no" });
    println!("Sources: {}", sources.len());
    Ok(())
}
