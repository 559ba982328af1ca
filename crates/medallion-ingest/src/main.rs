//! Medallion Ingest - moves one source through one lake tier

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use medallion_common::logging::{init_logging, LogConfig, LogLevel, WorkerGuard};
use medallion_common::types::{Format, Tier};
use medallion_ingest::layer::IngestOutcome;
use medallion_ingest::pipeline::{default_processing_date, parse_processing_date, Pipeline, PipelineRun};
use medallion_ingest::store::{RetryingStore, S3Store, StorageConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "medallion-ingest")]
#[command(author, version, about = "Raw -> bronze -> silver data lake ingestion")]
struct Cli {
    /// Data source name (key path segment and file prefix)
    #[arg(short, long)]
    source: String,

    /// Target tier: raw, bronze or silver
    #[arg(short, long)]
    layer: Tier,

    /// Processing date, YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS" (default: yesterday)
    #[arg(short, long)]
    date: Option<String>,

    /// Storage format: parquet, csv or json
    #[arg(short, long, default_value = "parquet")]
    format: String,

    /// Local file to ingest into the raw tier
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Stored parquet object to copy verbatim into the raw tier
    #[arg(long)]
    source_object: Option<String>,

    /// Partition the output by year/month/day of the processing date
    #[arg(long)]
    partition_by_date: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let guard = match setup_logging(cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            std::process::exit(1);
        },
    };

    let result = run(cli).await;
    if let Err(e) = &result {
        error!(error = %format!("{:#}", e), "Ingestion failed");
    }

    // process::exit skips destructors; flush file output first
    drop(guard);
    if result.is_err() {
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool) -> Result<Option<WorkerGuard>> {
    let log_level = if verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("medallion-ingest")
        .build()
        .merge_env()?;

    init_logging(&log_config)
}

async fn run(cli: Cli) -> Result<()> {
    let format: Format = cli.format.parse()?;
    let processing_date = match &cli.date {
        Some(date) => parse_processing_date(date)?,
        None => default_processing_date(),
    };

    let storage = StorageConfig::from_env().context("Invalid storage configuration")?;
    info!(
        bucket = %storage.bucket,
        region = %storage.region,
        "Starting {} ingestion for '{}'",
        cli.layer,
        cli.source
    );

    let s3 = S3Store::connect(&storage).await?;
    let store = Arc::new(RetryingStore::new(s3, storage.retry_policy()));

    let run = PipelineRun {
        source: cli.source,
        tier: cli.layer,
        processing_date,
        format,
        partition_by_date: cli.partition_by_date,
        input: cli.input,
        source_object: cli.source_object,
    };

    match Pipeline::new(store).run(&run).await? {
        IngestOutcome::Written { key, checksum } => {
            info!(checksum = %checksum, "Ingestion complete");
            println!("{}", key);
        },
        IngestOutcome::AlreadyPresent { key } => {
            info!("Object already existed, nothing written");
            println!("{}", key);
        },
        IngestOutcome::SkippedEmpty => {
            println!("Skipped: no rows to ingest");
        },
    }
    Ok(())
}
