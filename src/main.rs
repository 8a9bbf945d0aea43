//! Webx host binary
//!
//! Seeds one crawl job and drives the worker loop until the job reaches
//! a terminal state, then prints a summary. The full RPC tool surface
//! lives in a separate service; this binary is the minimal host loop.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use webx::config::{poll_interval_ms, CrawlOptions, PageMode};
use webx::storage::Store;
use webx::{CrawlEngine, WebxError};

/// Webx: crawl websites into structured pages for agents
#[derive(Parser, Debug)]
#[command(name = "webx")]
#[command(version)]
#[command(about = "Crawl websites into structured, agent-consumable pages", long_about = None)]
struct Cli {
    /// Seed URLs to start the crawl from
    #[arg(value_name = "SEED_URL", required = true)]
    seeds: Vec<String>,

    /// Path to the SQLite database
    #[arg(long, default_value = "data/webx.sqlite")]
    db: PathBuf,

    /// Maximum number of pages to fetch
    #[arg(long, default_value_t = 100)]
    max_pages: u32,

    /// Maximum link depth from the seeds
    #[arg(long, default_value_t = 2)]
    max_depth: u32,

    /// Extraction mode: compact or full
    #[arg(long, default_value = "compact")]
    mode: String,

    /// Restrict discovered links to these hosts (repeatable)
    #[arg(long = "allow-domain")]
    allow_domains: Vec<String>,

    /// Never enqueue these hosts (repeatable)
    #[arg(long = "deny-domain")]
    deny_domains: Vec<String>,

    /// Ignore robots.txt rules
    #[arg(long)]
    no_robots: bool,

    /// Skip sitemap-based seeding
    #[arg(long)]
    no_sitemaps: bool,

    /// Minimum delay between fetches to the same host, in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let options = options_from_cli(&cli)?;

    if let Some(parent) = cli.db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = Store::open(&cli.db)?;
    let mut engine = CrawlEngine::new(store)?;

    let job_id = engine.start(&cli.seeds, Some(options))?;
    tracing::info!("Crawl job {} started", job_id);

    let poll = Duration::from_millis(poll_interval_ms());
    loop {
        engine.process_active_jobs_once().await?;

        let status = engine.status(&job_id)?;
        tracing::debug!(
            "Job {}: pending={} processing={} done={} failed={}",
            job_id,
            status.stats.pending,
            status.stats.processing,
            status.stats.done,
            status.stats.failed
        );
        if !status.status.is_active() {
            break;
        }
        tokio::time::sleep(poll).await;
    }

    print_summary(&engine, &job_id)?;
    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webx=info,warn"),
            1 => EnvFilter::new("webx=debug,info"),
            2 => EnvFilter::new("webx=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn options_from_cli(cli: &Cli) -> Result<CrawlOptions, WebxError> {
    let mode = PageMode::from_db_string(&cli.mode)
        .ok_or_else(|| WebxError::Validation(format!("invalid mode: {}", cli.mode)))?;

    Ok(CrawlOptions {
        max_pages: cli.max_pages,
        max_depth: cli.max_depth,
        mode,
        allow_domains: (!cli.allow_domains.is_empty()).then(|| cli.allow_domains.clone()),
        deny_domains: (!cli.deny_domains.is_empty()).then(|| cli.deny_domains.clone()),
        respect_robots: !cli.no_robots,
        per_domain_delay_ms: cli.delay_ms,
        seed_from_sitemaps: !cli.no_sitemaps,
        ..Default::default()
    })
}

fn print_summary(engine: &CrawlEngine, job_id: &str) -> Result<(), WebxError> {
    let status = engine.status(job_id)?;

    println!("\n=== Crawl Summary ===");
    println!("Job:       {}", status.id);
    println!("Status:    {}", status.status.to_db_string());
    println!("Done:      {}", status.stats.done);
    println!("Failed:    {}", status.stats.failed);
    println!("Pending:   {}", status.stats.pending);

    let pages = engine.next(job_id, 10)?;
    if !pages.is_empty() {
        println!("\nMost recent pages:");
        for page in pages {
            println!("  {} ({})", page.url, page.title);
        }
    }
    Ok(())
}
