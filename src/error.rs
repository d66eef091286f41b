//! Error types for each pipeline stage.
//!
//! Every stage reports failure through its own error enum so the runner can
//! tell which stage broke and exit with a stage-specific code:
//!
//! | Error | Exit code |
//! |-------|-----------|
//! | [`ConfigError`] | 2 |
//! | [`ExtractError`] | 3 |
//! | [`TransformError`] | 4 |
//! | [`LoadError`] | 5 |

use arrow_schema::ArrowError;
use parquet::errors::ParquetError;
use std::path::PathBuf;
use thiserror::Error;

/// Missing or malformed configuration. Always fatal, raised before any stage runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(String),

    #[error("invalid BASE_URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("could not prepare directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reading, validating or writing a Parquet staging snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("snapshot schema mismatch: {0}")]
    Schema(String),
}

/// Extraction failed; no raw snapshot was written.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("request for page {page} failed: {source}")]
    Http {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("page {page} returned HTTP {status}: {body}")]
    Status { page: u32, status: u16, body: String },

    #[error("page {page} is not valid JSON: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("API returned an error on page {page}: {code}: {message}")]
    Api {
        page: u32,
        code: String,
        message: String,
    },

    #[error("pagination did not terminate within {max_pages} pages")]
    PageLimitExceeded { max_pages: u32 },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("could not write raw snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Transformation failed; the previous cleaned snapshot (if any) is untouched.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("could not start transform session: {0}")]
    Session(#[source] SnapshotError),

    #[error("{count} row(s) have a null publishedAt")]
    MissingPublishedAt { count: usize },

    #[error("unparsable publishedAt value: {0}")]
    TimestampParse(#[source] ArrowError),

    #[error("columnar operation failed: {0}")]
    Arrow(#[from] ArrowError),

    #[error("could not save cleaned snapshot: {0}")]
    Save(#[source] SnapshotError),
}

/// Failure reported by a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[cfg(test)]
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Loading failed. Connection failures happen before anything is cleared or
/// inserted.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not connect to document store: {0}")]
    Connection(#[source] StoreError),

    #[error("could not read cleaned snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("could not clear {collection} before loading: {source}")]
    Clear {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("bulk insert into {collection} failed: {source}")]
    Insert {
        collection: String,
        #[source]
        source: StoreError,
    },
}

/// Top-level run failure, one variant per stage.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Loading failed: {0}")]
    Load(#[from] LoadError),
}

impl EtlError {
    /// Process exit code for this failure, distinct per stage so a scheduler
    /// can tell which stage broke.
    pub fn exit_code(&self) -> u8 {
        match self {
            EtlError::Config(_) => 2,
            EtlError::Extract(_) => 3,
            EtlError::Transform(_) => 4,
            EtlError::Load(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_stage() {
        let errors = [
            EtlError::from(ConfigError::Missing("API_KEY".to_string())),
            EtlError::from(ExtractError::PageLimitExceeded { max_pages: 3 }),
            EtlError::from(TransformError::MissingPublishedAt { count: 1 }),
            EtlError::from(LoadError::Connection(StoreError::Unavailable(
                "refused".to_string(),
            ))),
        ];
        let codes: Vec<u8> = errors.iter().map(EtlError::exit_code).collect();
        assert_eq!(codes, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_stage_failure_messages() {
        let err = EtlError::from(ExtractError::PageLimitExceeded { max_pages: 3 });
        assert_eq!(
            err.to_string(),
            "Extraction failed: pagination did not terminate within 3 pages"
        );
    }
}
