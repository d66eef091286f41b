//! Parquet staging snapshots shared between stages.
//!
//! The staging directory holds exactly two files:
//!
//! ```text
//! PARQUET_PATH/
//! ├── data.parquet              # raw, written by the extractor
//! └── data_transformed.parquet  # cleaned, written by the transformer
//! ```
//!
//! # Submodules
//!
//! - [`raw`]: Schema of the raw snapshot and conversion from API records
//! - [`cleaned`]: Schema of the cleaned snapshot and conversion to typed articles
//!
//! # Atomic writes
//!
//! Snapshots are written to a sibling `*.tmp` file and renamed into place
//! once the Parquet footer is flushed, so a failed write never leaves a
//! truncated snapshot behind and a rerun overwrites rather than appends.

pub mod cleaned;
pub mod raw;

use crate::error::SnapshotError;
use arrow_array::RecordBatch;
use arrow_schema::{DataType, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Write `batches` to `path` as a Snappy-compressed Parquet file, atomically.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn write_batches(
    path: &Path,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }

    let tmp_path = temp_path(path);
    let written = write_parquet(&tmp_path, schema, batches).and_then(|rows| {
        fs::rename(&tmp_path, path).map_err(|source| io_error(path, source))?;
        Ok(rows)
    });

    match written {
        Ok(rows) => {
            debug!(rows, "Snapshot written");
            Ok(())
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), error = %cleanup, "Could not remove partial snapshot");
                }
            }
            Err(e)
        }
    }
}

fn write_parquet(
    path: &Path,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> Result<usize, SnapshotError> {
    let file = File::create(path).map_err(|source| io_error(path, source))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    let mut rows = 0;
    for batch in batches {
        writer.write(batch)?;
        rows += batch.num_rows();
    }
    writer.close()?;
    Ok(rows)
}

/// Read a snapshot as a list of record batches of at most `batch_size` rows.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), batch_size = batch_size))]
pub fn read_batches(
    path: &Path,
    batch_size: usize,
) -> Result<(SchemaRef, Vec<RecordBatch>), SnapshotError> {
    let file = File::open(path).map_err(|source| io_error(path, source))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(batch_size);
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    debug!(partitions = batches.len(), "Snapshot read");
    Ok((schema, batches))
}

/// Check that `schema` has a column `name` whose type satisfies `accepts`.
pub(crate) fn require_column(
    schema: &SchemaRef,
    name: &str,
    expected: &str,
    accepts: impl Fn(&DataType) -> bool,
) -> Result<(), SnapshotError> {
    let field = schema
        .field_with_name(name)
        .map_err(|_| SnapshotError::Schema(format!("missing column {name:?}")))?;
    if !accepts(field.data_type()) {
        return Err(SnapshotError::Schema(format!(
            "column {name:?} has type {}, expected {expected}",
            field.data_type()
        )));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}
