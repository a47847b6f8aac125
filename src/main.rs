//! Quarry command-line entry point

use anyhow::Context;
use clap::Parser;
use quarry::config::{load_config_with_hash, Config};
use quarry::crawler::{CrawlSession, ReqwestFetcher};
use quarry::output::{print_statistics, print_summary};
use quarry::storage::{SessionStatus, SqliteStorage};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Quarry: an adaptive crawler that keeps only content worth indexing
///
/// Crawls from the configured seeds under robots.txt and pacing rules,
/// scores every page for quality, and stores the pages that pass in SQLite.
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "Adaptive web crawler with content quality scoring", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quarry=info,warn"),
            1 => EnvFilter::new("quarry=debug,info"),
            2 => EnvFilter::new("quarry=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles `--dry-run`: prints the effective plan
fn handle_dry_run(config: &Config) {
    println!("=== Quarry Dry Run ===\n");

    println!("Crawler:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Delay: {}ms", config.crawler.delay_ms);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);
    println!("  Follow external links: {}", config.crawler.follow_external);
    println!("  Quality threshold: {}", config.crawler.quality_threshold);
    println!("  Duplicate threshold: {}", config.crawler.duplicate_threshold);
    println!(
        "  Retries: {} (circuit opens after {} failures for {}s)",
        config.crawler.max_retries,
        config.crawler.circuit_breaker_threshold,
        config.crawler.circuit_breaker_cooldown_seconds
    );
    println!("  User agent: {}", config.crawler.user_agent);

    if !config.crawler.include_patterns.is_empty() {
        println!("  Include: {}", config.crawler.include_patterns.join(", "));
    }
    if !config.crawler.exclude_patterns.is_empty() {
        println!("  Exclude: {}", config.crawler.exclude_patterns.join(", "));
    }

    println!("\nPipeline:");
    println!("  Min words: {}", config.pipeline.min_word_count);
    println!("  Min quality: {}", config.pipeline.min_quality_score);
    println!("  Languages: {}", config.pipeline.allowed_languages.join(", "));

    println!("\nTenant:");
    println!("  Organization: {}", config.tenant.organization_id);
    println!("  Domain: {}", config.tenant.domain_id);
    println!("  Connector: {}", config.tenant.connector_id);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles `--stats`: prints statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let stats = storage.page_stats()?;
    print_statistics(&stats);

    Ok(())
}

/// Runs a crawl session and records it in the database
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let storage = Arc::new(
        SqliteStorage::new(Path::new(&config.output.database_path))
            .context("failed to open database")?,
    );
    let fetcher = ReqwestFetcher::new(&config.crawler).context("failed to build HTTP client")?;

    tracing::info!(
        "Crawling {} seeds into {}",
        config.seeds.len(),
        config.output.database_path
    );

    let mut session = CrawlSession::new(config, fetcher, Arc::clone(&storage))?;
    let session_id = session.state().session_id.to_string();
    storage.begin_session(&session_id, config_hash)?;

    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current page");
            stop.store(true, Ordering::SeqCst);
        }
    });

    match session.run().await {
        Ok(summary) => {
            let status = if summary.interrupted {
                SessionStatus::Interrupted
            } else {
                SessionStatus::Completed
            };
            storage.finish_session(&summary, status)?;
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            if let Err(record_err) = storage.finish_session(&session.summary(), SessionStatus::Failed) {
                tracing::warn!("Could not record failed session: {}", record_err);
            }
            Err(e.into())
        }
    }
}
