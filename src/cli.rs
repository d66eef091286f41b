//! Command-line interface definitions for the news ETL pipeline.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can be provided via a command-line flag or an environment
//! variable; a `.env` file in the working directory is loaded first.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which part of the pipeline to run.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Pull today's articles from the API into the raw snapshot
    Extract,
    /// Clean the raw snapshot into the transformed snapshot
    Transform,
    /// Insert the transformed snapshot into today's collection
    Load,
    /// Extract, transform and load, in that order
    All,
}

impl Stage {
    pub fn runs_extract(self) -> bool {
        matches!(self, Stage::Extract | Stage::All)
    }

    pub fn runs_transform(self) -> bool {
        matches!(self, Stage::Transform | Stage::All)
    }

    pub fn runs_load(self) -> bool {
        matches!(self, Stage::Load | Stage::All)
    }
}

/// Command-line arguments for the news ETL pipeline.
///
/// Required values depend on the selected stage: the API settings are only
/// needed for extraction and the database settings only for loading. The
/// check happens in [`crate::config::PipelineConfig::from_cli`] so that a
/// missing value is reported before any stage runs.
///
/// # Examples
///
/// ```sh
/// # Full daily run, everything from the environment / .env
/// news_etl
///
/// # Re-run only the transform stage against an existing raw snapshot
/// news_etl --stage transform --parquet-path ./data --logging-path ./logs
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Stage(s) to run
    #[arg(long, value_enum, default_value_t = Stage::All)]
    pub stage: Stage,

    /// News API key
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API endpoint including static query parameters, e.g. `https://newsapi.org/v2/everything?q=rust`
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Directory for the staging snapshots
    #[arg(long, env = "PARQUET_PATH")]
    pub parquet_path: PathBuf,

    /// Directory for ETL_Logs.log
    #[arg(long, env = "LOGGING_PATH")]
    pub logging_path: PathBuf,

    /// MongoDB connection URI
    #[arg(long, env = "CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,

    /// Target database name
    #[arg(long, env = "DATABASE_NAME")]
    pub database_name: Option<String>,

    /// Per-request timeout for API calls, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Upper bound on the number of pages requested in one run
    #[arg(long, env = "MAX_PAGES", default_value_t = 100)]
    pub max_pages: u32,

    /// Fixed delay between page requests, in milliseconds
    #[arg(long, env = "PAGE_DELAY_MS", default_value_t = 1000)]
    pub page_delay_ms: u64,

    /// Rows per partition when reading snapshots for transformation
    #[arg(long, env = "BATCH_SIZE", default_value_t = 1024)]
    pub batch_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "news_etl",
            "--parquet-path",
            "./data",
            "--logging-path",
            "./logs",
            "--api-key",
            "secret",
            "--base-url",
            "https://newsapi.org/v2/everything?q=rust",
        ]);

        assert_eq!(cli.parquet_path, PathBuf::from("./data"));
        assert_eq!(cli.logging_path, PathBuf::from("./logs"));
        assert_eq!(cli.api_key.as_deref(), Some("secret"));
        assert_eq!(cli.stage, Stage::All);
    }

    #[test]
    fn test_cli_stage_flag() {
        let cli = Cli::parse_from([
            "news_etl",
            "--stage",
            "transform",
            "--parquet-path",
            "/tmp/data",
            "--logging-path",
            "/tmp/logs",
            "--batch-size",
            "64",
        ]);

        assert_eq!(cli.stage, Stage::Transform);
        assert_eq!(cli.batch_size, 64);
    }

    #[test]
    fn test_stage_selection() {
        assert!(Stage::All.runs_extract() && Stage::All.runs_transform() && Stage::All.runs_load());
        assert!(Stage::Extract.runs_extract());
        assert!(!Stage::Extract.runs_load());
        assert!(!Stage::Load.runs_transform());
    }
}
