//! The raw snapshot: API records flattened into columns, nulls preserved.
//!
//! Nested `source` objects become dotted `source.id` / `source.name` columns
//! and an explicit row ordinal is stored in [`INDEX_COLUMN`]. Cleaning up
//! both is the transformer's job.

use super::{read_batches, require_column, write_batches};
use crate::error::SnapshotError;
use crate::models::RawArticle;
use arrow_array::{ArrayRef, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Row ordinal column, named the way pandas names a stored index.
pub const INDEX_COLUMN: &str = "__index_level_0__";
pub const SOURCE_ID: &str = "source.id";
pub const SOURCE_NAME: &str = "source.name";
pub const PUBLISHED_AT: &str = "publishedAt";

/// Text columns of the raw snapshot, in column order after the index.
pub const TEXT_COLUMNS: [&str; 9] = [
    SOURCE_ID,
    SOURCE_NAME,
    "author",
    "title",
    "description",
    "url",
    "urlToImage",
    PUBLISHED_AT,
    "content",
];

pub fn schema() -> SchemaRef {
    let mut fields = vec![Field::new(INDEX_COLUMN, DataType::UInt64, false)];
    fields.extend(
        TEXT_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true)),
    );
    Arc::new(Schema::new(fields))
}

fn text_value<'a>(article: &'a RawArticle, column: &str) -> Option<&'a str> {
    match column {
        SOURCE_ID => article.source.id.as_deref(),
        SOURCE_NAME => article.source.name.as_deref(),
        "author" => article.author.as_deref(),
        "title" => article.title.as_deref(),
        "description" => article.description.as_deref(),
        "url" => article.url.as_deref(),
        "urlToImage" => article.urlToImage.as_deref(),
        PUBLISHED_AT => article.publishedAt.as_deref(),
        "content" => article.content.as_deref(),
        _ => None,
    }
}

/// Flatten API records into a single record batch, one row per article.
pub fn to_record_batch(articles: &[RawArticle]) -> Result<RecordBatch, SnapshotError> {
    let index: ArrayRef = Arc::new(UInt64Array::from_iter_values(0..articles.len() as u64));
    let mut columns = vec![index];
    for column in TEXT_COLUMNS {
        let values: StringArray = articles.iter().map(|a| text_value(a, column)).collect();
        columns.push(Arc::new(values));
    }
    Ok(RecordBatch::try_new(schema(), columns)?)
}

/// Write `articles` to the raw snapshot at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = articles.len()))]
pub fn write(path: &Path, articles: &[RawArticle]) -> Result<(), SnapshotError> {
    let batch = to_record_batch(articles)?;
    write_batches(path, batch.schema(), &[batch])?;
    info!("Raw snapshot written");
    Ok(())
}

/// Read the raw snapshot as partitions of at most `batch_size` rows.
///
/// # Errors
///
/// [`SnapshotError::Schema`] if any of the [`TEXT_COLUMNS`] is missing or not
/// a string column. The index column is optional.
pub fn read(path: &Path, batch_size: usize) -> Result<(SchemaRef, Vec<RecordBatch>), SnapshotError> {
    let (schema, batches) = read_batches(path, batch_size)?;
    for column in TEXT_COLUMNS {
        require_column(&schema, column, "Utf8", |dt| *dt == DataType::Utf8)?;
    }
    Ok((schema, batches))
}
