//! Validated pipeline configuration.
//!
//! [`PipelineConfig`] is built once at startup from the parsed [`Cli`] and
//! passed by reference into each stage. Settings that only one stage needs
//! live in their own struct and are only required when that stage runs.

use crate::cli::{Cli, Stage};
use crate::error::ConfigError;
use itertools::Itertools;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Rows requested per API page.
pub const PAGE_SIZE: u32 = 10;

const RAW_SNAPSHOT: &str = "data.parquet";
const CLEANED_SNAPSHOT: &str = "data_transformed.parquet";
const LOG_FILE: &str = "ETL_Logs.log";

/// Everything a run needs, validated up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub stage: Stage,
    pub staging: StagingPaths,
    /// Present whenever `stage` includes extraction.
    pub extract: Option<ExtractSettings>,
    /// Present whenever `stage` includes loading.
    pub load: Option<LoadSettings>,
    pub transform: TransformSettings,
}

/// Settings for talking to the news API.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub api_key: String,
    /// Endpoint plus static query parameters; `from`, `apiKey`, `pageSize`
    /// and `page` are appended per request.
    pub base_url: Url,
    pub page_size: u32,
    pub max_pages: u32,
    pub page_delay: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TransformSettings {
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub connection_string: String,
    pub database_name: String,
    /// How long the driver may search for a reachable server before the
    /// health check fails.
    pub server_selection_timeout: Duration,
}

/// Locations of the two staging snapshots.
#[derive(Debug, Clone)]
pub struct StagingPaths {
    dir: PathBuf,
}

impl StagingPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{PARQUET_PATH}/data.parquet`
    pub fn raw(&self) -> PathBuf {
        self.dir.join(RAW_SNAPSHOT)
    }

    /// `{PARQUET_PATH}/data_transformed.parquet`
    pub fn cleaned(&self) -> PathBuf {
        self.dir.join(CLEANED_SNAPSHOT)
    }
}

impl PipelineConfig {
    /// Validate the CLI/environment values for the selected stage.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming every absent key the selected
    /// stage needs, [`ConfigError::InvalidBaseUrl`] if `BASE_URL` does not
    /// parse, or [`ConfigError::Zero`] for zero-valued limits.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let stage = cli.stage;

        let mut missing = Vec::new();
        if stage.runs_extract() {
            if blank(&cli.api_key) {
                missing.push("API_KEY");
            }
            if blank(&cli.base_url) {
                missing.push("BASE_URL");
            }
        }
        if stage.runs_load() {
            if blank(&cli.connection_string) {
                missing.push("CONNECTION_STRING");
            }
            if blank(&cli.database_name) {
                missing.push("DATABASE_NAME");
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing.iter().join(", ")));
        }

        if cli.max_pages == 0 {
            return Err(ConfigError::Zero { name: "MAX_PAGES" });
        }
        if cli.batch_size == 0 {
            return Err(ConfigError::Zero { name: "BATCH_SIZE" });
        }
        if cli.request_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                name: "REQUEST_TIMEOUT_SECS",
            });
        }

        let extract = match (stage.runs_extract(), cli.api_key, cli.base_url) {
            (true, Some(api_key), Some(base_url)) => {
                let parsed = Url::parse(&base_url).map_err(|source| {
                    ConfigError::InvalidBaseUrl {
                        url: base_url.clone(),
                        source,
                    }
                })?;
                Some(ExtractSettings {
                    api_key,
                    base_url: parsed,
                    page_size: PAGE_SIZE,
                    max_pages: cli.max_pages,
                    page_delay: Duration::from_millis(cli.page_delay_ms),
                    request_timeout: Duration::from_secs(cli.request_timeout_secs),
                })
            }
            _ => None,
        };

        let load = match (stage.runs_load(), cli.connection_string, cli.database_name) {
            (true, Some(connection_string), Some(database_name)) => Some(LoadSettings {
                connection_string,
                database_name,
                server_selection_timeout: Duration::from_secs(cli.request_timeout_secs),
            }),
            _ => None,
        };

        Ok(Self {
            stage,
            staging: StagingPaths::new(cli.parquet_path),
            extract,
            load,
            transform: TransformSettings {
                batch_size: cli.batch_size,
            },
        })
    }
}

/// `{LOGGING_PATH}/ETL_Logs.log`
pub fn log_file(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE)
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(stage: Stage) -> Cli {
        Cli {
            stage,
            api_key: Some("key".to_string()),
            base_url: Some("https://newsapi.org/v2/everything?q=rust".to_string()),
            parquet_path: PathBuf::from("/tmp/staging"),
            logging_path: PathBuf::from("/tmp/logs"),
            connection_string: Some("mongodb://localhost:27017".to_string()),
            database_name: Some("news".to_string()),
            request_timeout_secs: 30,
            max_pages: 100,
            page_delay_ms: 1000,
            batch_size: 1024,
        }
    }

    #[test]
    fn test_full_run_config() {
        let config = PipelineConfig::from_cli(cli(Stage::All)).unwrap();
        let extract = config.extract.unwrap();
        assert_eq!(extract.page_size, 10);
        assert_eq!(extract.page_delay, Duration::from_secs(1));
        assert_eq!(extract.base_url.query(), Some("q=rust"));
        assert_eq!(config.load.unwrap().database_name, "news");
        assert_eq!(
            config.staging.raw(),
            PathBuf::from("/tmp/staging/data.parquet")
        );
        assert_eq!(
            config.staging.cleaned(),
            PathBuf::from("/tmp/staging/data_transformed.parquet")
        );
    }

    #[test]
    fn test_missing_keys_are_all_reported() {
        let mut args = cli(Stage::All);
        args.api_key = None;
        args.database_name = Some("  ".to_string());

        let err = PipelineConfig::from_cli(args).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required configuration: API_KEY, DATABASE_NAME"
        );
    }

    #[test]
    fn test_transform_only_needs_no_credentials() {
        let mut args = cli(Stage::Transform);
        args.api_key = None;
        args.base_url = None;
        args.connection_string = None;
        args.database_name = None;

        let config = PipelineConfig::from_cli(args).unwrap();
        assert!(config.extract.is_none());
        assert!(config.load.is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut args = cli(Stage::Extract);
        args.base_url = Some("not a url".to_string());
        assert!(matches!(
            PipelineConfig::from_cli(args),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_zero_page_ceiling_rejected() {
        let mut args = cli(Stage::Extract);
        args.max_pages = 0;
        assert!(matches!(
            PipelineConfig::from_cli(args),
            Err(ConfigError::Zero { name: "MAX_PAGES" })
        ));
    }

    #[test]
    fn test_log_file_path() {
        assert_eq!(
            log_file(Path::new("/var/log/etl")),
            PathBuf::from("/var/log/etl/ETL_Logs.log")
        );
    }
}
