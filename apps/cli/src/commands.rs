//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use firmscope_core::{BatchMode, ChatExtractor, Extractor, Orchestrator};
use firmscope_crawler::HttpFetcher;
use firmscope_shared::{
    AppConfig, BatchConfig, CrawlConfig, ProcessingResult, init_config, load_config,
    load_config_from, validate_api_key,
};
use firmscope_storage::Storage;
use firmscope_taxonomy::{SectorSearch, Taxonomy, TaxonomyQueries};
use serde::Serialize;
use tracing::info;

use crate::export::{ExportFormat, write_results};
use crate::progress::{CliProgress, spinner};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// FirmScope — structured company profiles from company websites.
#[derive(Parser)]
#[command(
    name = "firmscope",
    version,
    about = "Crawl company websites, extract structured company profiles, and validate their sectors.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.firmscope/firmscope.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding `storage.database_path`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl one company website and extract its profile.
    Process {
        /// Company website URL.
        url: String,

        /// Page cap for this crawl.
        #[arg(long)]
        max_pages: Option<usize>,

        /// Write the result to this file.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Format of the `--out` file.
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Print the full result as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Process every URL listed in a file (one per line, `#` comments allowed).
    Batch {
        /// File with one URL per line.
        file: PathBuf,

        /// Run URLs concurrently.
        #[arg(long, conflicts_with = "sequential")]
        parallel: bool,

        /// Run URLs one at a time.
        #[arg(long)]
        sequential: bool,

        /// Worker-pool size for parallel runs.
        #[arg(long)]
        max_parallel: Option<usize>,

        /// URLs per parallel chunk.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Page cap per site.
        #[arg(long)]
        max_pages: Option<usize>,

        /// Write all results to this file.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Format of the `--out` file.
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
    },

    /// Browse stored companies.
    Companies {
        #[command(subcommand)]
        action: CompaniesAction,
    },

    /// Show the most recent processing runs.
    Results {
        /// Number of runs to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show database statistics.
    Stats,

    /// Query the sector vocabulary.
    Sectors {
        #[command(subcommand)]
        action: SectorsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Company subcommands.
#[derive(Subcommand)]
pub(crate) enum CompaniesAction {
    /// List every stored company.
    List,
    /// Search companies by name, industry, headline or description.
    Search {
        query: String,
    },
    /// Show a company's full record and processing history.
    Show {
        id: String,
    },
    /// Delete a company with its services and products.
    Delete {
        id: String,
    },
}

/// Sector subcommands.
#[derive(Subcommand)]
pub(crate) enum SectorsAction {
    /// Search industries, sub-industries and solution areas by keywords.
    Search {
        keywords: String,
    },
    /// Recommend sectors for a company description.
    Recommend {
        description: String,

        /// Comma-separated technologies.
        #[arg(long)]
        tech: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "firmscope=info",
        1 => "firmscope=debug",
        _ => "firmscope=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config: config_path,
        db,
        command,
        ..
    } = cli;

    let load = || -> Result<AppConfig> {
        let mut config = match &config_path {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        if let Some(db) = &db {
            config.storage.database_path = db.to_string_lossy().into_owned();
        }
        Ok(config)
    };

    match command {
        Command::Process {
            url,
            max_pages,
            out,
            format,
            json,
        } => {
            let mut config = load()?;
            if let Some(n) = max_pages {
                config.crawler.max_pages_per_domain = n;
            }
            cmd_process(&config, &url, out.as_deref(), format, json).await
        }
        Command::Batch {
            file,
            parallel,
            sequential,
            max_parallel,
            batch_size,
            max_pages,
            out,
            format,
        } => {
            let mut config = load()?;
            if let Some(n) = max_parallel {
                config.processing.max_parallel = n;
            }
            if let Some(n) = batch_size {
                config.processing.batch_size = n;
            }
            if let Some(n) = max_pages {
                config.crawler.max_pages_per_domain = n;
            }
            let mode = match (parallel, sequential) {
                (true, _) => Some(BatchMode::Parallel),
                (_, true) => Some(BatchMode::Sequential),
                _ => None,
            };
            cmd_batch(&config, &file, mode, out.as_deref(), format).await
        }
        Command::Companies { action } => {
            let config = load()?;
            match action {
                CompaniesAction::List => cmd_companies_list(&config, None).await,
                CompaniesAction::Search { query } => {
                    cmd_companies_list(&config, Some(&query)).await
                }
                CompaniesAction::Show { id } => cmd_companies_show(&config, &id).await,
                CompaniesAction::Delete { id } => cmd_companies_delete(&config, &id).await,
            }
        }
        Command::Results { limit } => cmd_results(&load()?, limit).await,
        Command::Stats => cmd_stats(&load()?).await,
        Command::Sectors { action } => match action {
            SectorsAction::Search { keywords } => {
                let search = sector_search(&load()?)?;
                print_json(&search.search_by_keywords(&keywords))
            }
            SectorsAction::Recommend { description, tech } => {
                let search = sector_search(&load()?)?;
                let technologies: Vec<String> = tech
                    .as_deref()
                    .unwrap_or("")
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect();
                print_json(&search.recommend_for_description(&description, &technologies))
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&load()?),
        },
    }
}

// ---------------------------------------------------------------------------
// Pipeline commands
// ---------------------------------------------------------------------------

/// Wire the orchestrator from config: vocabulary, extractor pool, fetcher, database.
async fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    // The API key must be present before any URL is attempted.
    validate_api_key(config)?;

    let crawl = CrawlConfig::from(config);
    let batch = BatchConfig::from(config);

    let taxonomy = Arc::new(Taxonomy::load(Path::new(&config.taxonomy.sectors_path))?);
    let tools: Arc<dyn TaxonomyQueries> = Arc::new(SectorSearch::new(Arc::clone(&taxonomy)));

    let mut extractors: Vec<Arc<dyn Extractor>> = Vec::with_capacity(batch.max_parallel);
    for _ in 0..batch.max_parallel {
        extractors.push(Arc::new(ChatExtractor::from_config(
            &config.llm,
            Arc::clone(&tools),
        )?));
    }

    let fetcher = Arc::new(HttpFetcher::new(&crawl)?);
    let storage = Arc::new(Storage::open(Path::new(&config.storage.database_path)).await?);

    Ok(Orchestrator::new(
        crawl, batch, fetcher, taxonomy, extractors, storage,
    )?)
}

async fn cmd_process(
    config: &AppConfig,
    url: &str,
    out: Option<&Path>,
    format: ExportFormat,
    json: bool,
) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    info!(url, "processing company website");

    let progress = spinner(format!("Processing {url}"));
    let result = orchestrator.process_url(url).await;
    progress.finish_and_clear();

    if let Some(path) = out {
        write_results(path, format, std::slice::from_ref(&result))?;
    }
    if json {
        print_json(&result)?;
    } else {
        print_result(&result);
    }

    if result.is_success() {
        Ok(())
    } else {
        Err(eyre!("processing failed"))
    }
}

async fn cmd_batch(
    config: &AppConfig,
    file: &Path,
    mode: Option<BatchMode>,
    out: Option<&Path>,
    format: ExportFormat,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read URL list '{}': {e}", file.display()))?;
    let urls = parse_url_list(&content);
    if urls.is_empty() {
        return Err(eyre!("no URLs found in '{}'", file.display()));
    }

    let orchestrator = build_orchestrator(config).await?;
    info!(count = urls.len(), "processing batch");

    let progress = CliProgress::new();
    let results = orchestrator.run_batch(&urls, mode, &progress).await;
    progress.finish();

    if let Some(path) = out {
        write_results(path, format, &results)?;
    }

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    println!();
    for result in &results {
        let status = if result.is_success() { "ok    " } else { "FAILED" };
        let label = result
            .record()
            .and_then(|r| r.company_name())
            .or(result.error())
            .unwrap_or("-");
        println!("  {status} {}  {label}", result.url());
    }
    println!();
    println!(
        "  {succeeded}/{} succeeded, {} failed",
        results.len(),
        results.len() - succeeded
    );
    if let Some(path) = out {
        println!("  Results written to {}", path.display());
    }
    println!();

    Ok(())
}

/// Non-empty, non-comment lines of a URL list.
fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

fn print_result(result: &ProcessingResult) {
    println!();
    println!("  URL:    {}", result.url());
    println!("  Pages:  {}", result.pages_crawled());
    println!("  Time:   {:.1}s", result.processing_time_secs());

    match result.record() {
        Some(record) => {
            let info = &record.company_info;
            println!("  Name:     {}", record.company_name().unwrap_or("-"));
            println!("  Industry: {}", info.industry.as_deref().unwrap_or("-"));
            println!("  Services: {}", record.services.len());
            println!("  Products: {}", record.products.len());
            if let Some(report) = &record.validation {
                for note in &report.corrections {
                    println!("  corrected: {note}");
                }
                for note in &report.issues {
                    println!("  issue:     {note}");
                }
            }
        }
        None => println!("  Error:  {}", result.error().unwrap_or("unknown error")),
    }
    println!();
}

// ---------------------------------------------------------------------------
// Database commands
// ---------------------------------------------------------------------------

async fn open_readonly(config: &AppConfig) -> Result<Storage> {
    Ok(Storage::open_readonly(Path::new(&config.storage.database_path)).await?)
}

async fn cmd_companies_list(config: &AppConfig, query: Option<&str>) -> Result<()> {
    let storage = open_readonly(config).await?;
    let companies = match query {
        Some(q) => storage.search_companies(q).await?,
        None => storage.list_companies().await?,
    };

    if companies.is_empty() {
        println!("No companies found.");
        return Ok(());
    }
    for c in &companies {
        println!(
            "{}  {:<30}  {:<24}  {} services, {} products  {}",
            c.id,
            c.name.as_deref().unwrap_or("-"),
            c.industry.as_deref().unwrap_or("-"),
            c.service_count,
            c.product_count,
            c.url
        );
    }
    Ok(())
}

async fn cmd_companies_show(config: &AppConfig, id: &str) -> Result<()> {
    let storage = open_readonly(config).await?;
    let details = storage
        .get_company_details(id)
        .await?
        .ok_or_else(|| eyre!("no company with id '{id}'"))?;
    print_json(&details)
}

async fn cmd_companies_delete(config: &AppConfig, id: &str) -> Result<()> {
    let storage = Storage::open(Path::new(&config.storage.database_path)).await?;
    if storage.delete_company(id).await? {
        println!("Deleted company {id}");
        Ok(())
    } else {
        Err(eyre!("no company with id '{id}'"))
    }
}

async fn cmd_results(config: &AppConfig, limit: usize) -> Result<()> {
    let storage = open_readonly(config).await?;
    let entries = storage.get_processing_results(limit).await?;

    if entries.is_empty() {
        println!("No processing runs recorded.");
        return Ok(());
    }
    for e in &entries {
        let status = if e.success { "ok    " } else { "FAILED" };
        println!(
            "{}  {status}  {:>3} pages  {:>6.1}s  {}  {}",
            e.timestamp,
            e.pages_crawled,
            e.processing_time_secs,
            e.url,
            e.company_name.as_deref().or(e.error.as_deref()).unwrap_or("")
        );
    }
    Ok(())
}

async fn cmd_stats(config: &AppConfig) -> Result<()> {
    let storage = open_readonly(config).await?;
    let stats = storage.statistics().await?;

    println!();
    println!("  Companies:       {}", stats.total_companies);
    println!("  Processing runs: {}", stats.total_results);
    println!("  Succeeded:       {}", stats.successful_results);
    println!("  Failed:          {}", stats.failed_results);
    if !stats.top_industries.is_empty() {
        println!();
        println!("  Top industries:");
        for c in &stats.top_industries {
            println!("    {:<30} {}", c.label, c.count);
        }
    }
    if !stats.recent_activity.is_empty() {
        println!();
        println!("  Last 30 days:");
        for c in &stats.recent_activity {
            println!("    {}  {}", c.label, c.count);
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Sector and config commands
// ---------------------------------------------------------------------------

fn sector_search(config: &AppConfig) -> Result<SectorSearch> {
    let taxonomy = Taxonomy::load(Path::new(&config.taxonomy.sectors_path))?;
    Ok(SectorSearch::new(Arc::new(taxonomy)))
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
