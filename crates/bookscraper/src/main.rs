//! Bookscraper - catalog record ingestion tool

use anyhow::{bail, Context, Result};
use bookscraper::config::ScraperConfig;
use bookscraper::headers::HeaderPool;
use bookscraper::normalizer::normalize;
use bookscraper::pipeline;
use bookscraper::shaper::RequestShaper;
use bookscraper::sink::RecordSink;
use bookscraper_common::logging::{init_logging, LogConfig, LogLevel};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "bookscraper")]
#[command(author, version, about = "Catalog record normalization and ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Normalize raw records and store them in the database
    Ingest {
        /// JSON Lines file of raw records
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Normalize raw records and print them as JSON Lines
    Normalize {
        /// JSON Lines file of raw records
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Fetch browser headers from the provider and print one set
    Headers,

    /// Send a GET request with rotated browser headers
    Fetch {
        /// Page to request
        url: String,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("bookscraper")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let config = ScraperConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Ingest { input } => ingest(&config, &input).await?,
        Command::Normalize { input } => normalize_file(&input)?,
        Command::Headers => headers(&config).await?,
        Command::Fetch { url, timeout } => fetch(&config, &url, timeout).await?,
    }

    Ok(())
}

async fn ingest(config: &ScraperConfig, input: &Path) -> Result<()> {
    info!(input = %input.display(), "Ingesting records");

    let mut sink = RecordSink::open(&config.sink)
        .await
        .context("Failed to open record sink")?;

    let result = match sink.ensure_schema().await {
        Ok(()) => pipeline::ingest_file(input, &mut sink).await,
        Err(e) => Err(e.into()),
    };

    // Release the connection even when the run failed
    if let Err(e) = sink.close().await {
        warn!(error = %e, "Failed to close record sink");
    }

    let stats = result.with_context(|| format!("Ingestion of {} aborted", input.display()))?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    info!(
        stored = stats.stored,
        dropped = stats.dropped,
        failed = stats.failed,
        skipped = stats.skipped,
        "Ingestion complete"
    );
    Ok(())
}

fn normalize_file(input: &Path) -> Result<()> {
    let (records, skipped) = pipeline::load_records(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut dropped = 0;
    for raw in &records {
        match normalize(raw) {
            Ok(record) => println!("{}", serde_json::to_string(&record)?),
            Err(e) => {
                dropped += 1;
                warn!(
                    field = e.field(),
                    value = e.value().unwrap_or_default(),
                    error = %e,
                    "Record failed validation"
                );
            },
        }
    }

    info!(
        normalized = records.len() - dropped,
        dropped,
        skipped,
        "Normalization complete"
    );
    Ok(())
}

async fn headers(config: &ScraperConfig) -> Result<()> {
    let mut pool = HeaderPool::new(config.headers.clone());
    if !pool.is_enabled() {
        bail!(
            "Header rotation is disabled; set SCRAPEOPS_API_KEY and \
             SCRAPEOPS_FAKE_BROWSER_HEADER_ENABLED=true"
        );
    }

    let count = pool.refresh().await.context("Failed to fetch browser headers")?;
    info!(count, "Fetched browser header templates");

    let template = pool.pick()?;
    let map: serde_json::Map<String, serde_json::Value> = template
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or_default().to_string();
            (name.as_str().to_string(), serde_json::Value::String(value))
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&map)?);
    Ok(())
}

async fn fetch(config: &ScraperConfig, url: &str, timeout: u64) -> Result<()> {
    let shaper = RequestShaper::new(Arc::new(HeaderPool::initialize(config.headers.clone()).await));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .context("Failed to build HTTP client")?;

    let mut request = client
        .get(url)
        .build()
        .with_context(|| format!("Invalid URL '{}'", url))?;

    if !shaper.decorate(&mut request) {
        info!("Sending request with default headers");
    }

    for (name, value) in request.headers() {
        println!("> {}: {}", name, value.to_str().unwrap_or("<binary>"));
    }

    let response = client
        .execute(request)
        .await
        .with_context(|| format!("Request to {} failed", url))?;

    println!("< {}", response.status());
    info!(url, status = %response.status(), "Fetched page");
    Ok(())
}
