//! The cleaned snapshot, and conversion back into typed [`Article`] records.
//!
//! Reading is the validation boundary for the loader: either every row
//! becomes an [`Article`] or the read fails with a schema error. No value is
//! coerced along the way.

use super::{read_batches, require_column, write_batches};
use crate::error::SnapshotError;
use crate::models::Article;
use arrow_array::cast::AsArray;
use arrow_array::types::TimestampMicrosecondType;
use arrow_array::{Array, RecordBatch, StringArray, TimestampMicrosecondArray};
use arrow_schema::{DataType, SchemaRef, TimeUnit};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{info, instrument};

pub const SOURCE_NAME: &str = "source_name";
pub const PUBLISHED_AT: &str = "publishedAt";

/// String columns every cleaned snapshot must carry.
pub const TEXT_COLUMNS: [&str; 7] = [
    SOURCE_NAME,
    "author",
    "title",
    "description",
    "url",
    "urlToImage",
    "content",
];

const READ_BATCH_SIZE: usize = 8192;

/// The type `publishedAt` is normalized to: microseconds, UTC.
pub fn published_at_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

fn is_utc_micros(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Timestamp(TimeUnit::Microsecond, Some(tz))
            if tz.eq_ignore_ascii_case("UTC") || &**tz == "+00:00"
    )
}

/// Write the cleaned partitions to `path`, replacing any previous snapshot.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn write(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> Result<(), SnapshotError> {
    validate(&schema)?;
    write_batches(path, schema, batches)?;
    info!("Cleaned snapshot written");
    Ok(())
}

fn validate(schema: &SchemaRef) -> Result<(), SnapshotError> {
    for column in TEXT_COLUMNS {
        require_column(schema, column, "Utf8", |dt| *dt == DataType::Utf8)?;
    }
    require_column(schema, PUBLISHED_AT, "Timestamp(Microsecond, UTC)", is_utc_micros)
}

/// Read the cleaned snapshot into typed articles.
///
/// # Errors
///
/// [`SnapshotError::Schema`] if a column is missing, has the wrong type or
/// contains a null.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_articles(path: &Path) -> Result<Vec<Article>, SnapshotError> {
    let (schema, batches) = read_batches(path, READ_BATCH_SIZE)?;
    validate(&schema)?;

    let mut articles = Vec::new();
    for batch in &batches {
        articles.extend(batch_to_articles(batch)?);
    }
    info!(rows = articles.len(), "Cleaned snapshot read");
    Ok(articles)
}

fn text_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, SnapshotError> {
    let column = batch
        .column_by_name(name)
        .and_then(|c| c.as_string_opt::<i32>())
        .ok_or_else(|| SnapshotError::Schema(format!("column {name:?} is not a string column")))?;
    no_nulls(name, column)?;
    Ok(column)
}

fn no_nulls(name: &str, column: &dyn Array) -> Result<(), SnapshotError> {
    match column.null_count() {
        0 => Ok(()),
        n => Err(SnapshotError::Schema(format!("column {name:?} contains {n} null(s)"))),
    }
}

fn batch_to_articles(batch: &RecordBatch) -> Result<Vec<Article>, SnapshotError> {
    let source_name = text_column(batch, SOURCE_NAME)?;
    let author = text_column(batch, "author")?;
    let title = text_column(batch, "title")?;
    let description = text_column(batch, "description")?;
    let url = text_column(batch, "url")?;
    let url_to_image = text_column(batch, "urlToImage")?;
    let content = text_column(batch, "content")?;
    let published_at: &TimestampMicrosecondArray = batch
        .column_by_name(PUBLISHED_AT)
        .and_then(|c| c.as_primitive_opt::<TimestampMicrosecondType>())
        .ok_or_else(|| SnapshotError::Schema(format!("column {PUBLISHED_AT:?} is not a timestamp")))?;
    no_nulls(PUBLISHED_AT, published_at)?;

    (0..batch.num_rows())
        .map(|i| {
            let micros = published_at.value(i);
            let published_at = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
                SnapshotError::Schema(format!("publishedAt {micros}µs is out of range"))
            })?;
            Ok(Article {
                source_name: source_name.value(i).to_string(),
                author: author.value(i).to_string(),
                title: title.value(i).to_string(),
                description: description.value(i).to_string(),
                url: url.value(i).to_string(),
                url_to_image: url_to_image.value(i).to_string(),
                published_at,
                content: content.value(i).to_string(),
            })
        })
        .collect()
}
