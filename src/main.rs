//! # News ETL
//!
//! A daily batch pipeline that pulls news articles from a search API, cleans
//! them into columnar Parquet snapshots and loads them into MongoDB.
//!
//! ## Usage
//!
//! ```sh
//! news_etl                      # extract, transform and load
//! news_etl --stage transform    # one stage against existing snapshots
//! ```
//!
//! ## Architecture
//!
//! The stages run strictly in sequence and hand data over through files in
//! `PARQUET_PATH`:
//! 1. **Extract**: Page through the API for today's articles into `data.parquet`
//! 2. **Transform**: Normalize, fill nulls, deduplicate and parse timestamps
//!    into `data_transformed.parquet`
//! 3. **Load**: Bulk insert into the `YYYY_MM_DD` collection of `DATABASE_NAME`
//!
//! A failed stage stops the run; the process exit code tells which stage
//! failed (see [`error::EtlError::exit_code`]).

use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

mod api;
mod cli;
mod config;
mod error;
mod extract;
mod load;
mod logging;
mod models;
mod snapshots;
mod store;
mod transform;
mod utils;

use cli::Cli;
use config::PipelineConfig;
use error::{ConfigError, EtlError, LoadError};
use models::RunDate;
use store::MongoStore;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Cli::parse();

    // Logging is not up yet, so this one goes straight to stderr
    if let Err(e) = ensure_writable_dir(&args.logging_path).await {
        eprintln!(
            "Log directory {} is not writable: {e}",
            args.logging_path.display()
        );
        return ExitCode::from(2);
    }
    if let Err(e) = logging::init(&args.logging_path) {
        eprintln!("{e}");
        return ExitCode::from(2);
    }

    let start_time = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), stage = ?args.stage, "news_etl starting up");

    match run(args).await {
        Ok(()) => {
            info!(
                elapsed_secs = start_time.elapsed().as_secs_f64(),
                "Run completed"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, exit_code = e.exit_code(), "Run failed");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Validate configuration, then run the selected stages in order.
#[instrument(level = "info", skip_all)]
async fn run(args: Cli) -> Result<(), EtlError> {
    let config = PipelineConfig::from_cli(args)?;
    let run_date = RunDate::today();
    debug!(?config.stage, staging = %config.staging.dir().display(), %run_date, "Configuration loaded");

    ensure_writable_dir(config.staging.dir())
        .await
        .map_err(|source| ConfigError::Directory {
            path: config.staging.dir().to_path_buf(),
            source,
        })?;

    if let Some(settings) = &config.extract {
        let t0 = Instant::now();
        let summary = extract::extract(settings, &config.staging, run_date).await?;
        info!(
            requests = summary.requests,
            articles = summary.articles,
            elapsed_secs = t0.elapsed().as_secs_f64(),
            "Extract stage finished"
        );
    }

    if config.stage.runs_transform() {
        let t0 = Instant::now();
        let summary = transform::transform(&config.transform, &config.staging)?;
        info!(
            rows_in = summary.rows_in,
            rows_out = summary.rows_out,
            duplicates_removed = summary.duplicates_removed,
            elapsed_secs = t0.elapsed().as_secs_f64(),
            "Transform stage finished"
        );
    }

    if let Some(settings) = &config.load {
        let t0 = Instant::now();
        let store = MongoStore::connect(settings)
            .await
            .map_err(LoadError::Connection)?;
        let summary = load::load(settings, &config.staging, run_date, &store).await?;
        info!(
            collection = %summary.collection,
            replaced = summary.replaced,
            inserted = summary.inserted,
            elapsed_secs = t0.elapsed().as_secs_f64(),
            "Load stage finished"
        );
    }

    Ok(())
}
