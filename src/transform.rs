//! Transformation stage: raw snapshot in, cleaned snapshot out.
//!
//! The raw snapshot is loaded into a [`TransformSession`], a set of Arrow
//! record-batch partitions, and cleaned in a fixed order:
//!
//! 1. **Normalize columns**: drop the index column, rename `source.name` to
//!    `source_name`, drop `source.id`
//! 2. **Fill nulls**: every null string becomes [`SENTINEL`]
//! 3. **Drop duplicates**: fully identical rows are kept once, across all partitions
//! 4. **Parse timestamps**: `publishedAt` text becomes a UTC timestamp via a
//!    strict Arrow cast, so a single unparsable value fails the stage
//!
//! Steps 1, 2 and 4 are per-partition and run in parallel with `rayon`;
//! step 3 is global and runs once more after step 4, so rows whose
//! timestamps only differ in notation are also collapsed. Running the
//! pipeline on an already cleaned dataset changes nothing.

use crate::config::{StagingPaths, TransformSettings};
use crate::error::TransformError;
use crate::models::SENTINEL;
use crate::snapshots::{cleaned, raw};
use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef, BooleanArray, RecordBatch, StringArray};
use arrow_cast::{CastOptions, cast_with_options};
use arrow_row::{OwnedRow, RowConverter, SortField};
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef};
use arrow_select::filter::filter_record_batch;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// Outcome of a successful transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSummary {
    pub rows_in: usize,
    pub rows_out: usize,
    pub duplicates_removed: usize,
}

/// A partitioned, in-memory columnar dataset being cleaned.
#[derive(Debug, Clone)]
pub struct TransformSession {
    schema: SchemaRef,
    partitions: Vec<RecordBatch>,
}

impl TransformSession {
    /// Open the raw snapshot as partitions of `settings.batch_size` rows.
    ///
    /// # Errors
    ///
    /// [`TransformError::Session`] if the snapshot is missing, unreadable or
    /// does not have the raw snapshot schema.
    #[instrument(level = "info", skip_all, fields(path = %staging.raw().display()))]
    pub fn start(staging: &StagingPaths, settings: &TransformSettings) -> Result<Self, TransformError> {
        let (schema, partitions) = raw::read(&staging.raw(), settings.batch_size).map_err(|e| {
            error!(error = %e, "An error occurred while starting the transform session");
            TransformError::Session(e)
        })?;
        let session = Self::from_partitions(schema, partitions);
        info!(
            partitions = session.partitions.len(),
            rows = session.row_count(),
            "Transform session started"
        );
        Ok(session)
    }

    /// Build a session over in-memory partitions sharing `schema`.
    ///
    /// An empty partition is kept for an empty dataset so the cleaned schema
    /// is still derived and written.
    pub fn from_partitions(schema: SchemaRef, mut partitions: Vec<RecordBatch>) -> Self {
        if partitions.is_empty() {
            partitions.push(RecordBatch::new_empty(schema.clone()));
        }
        Self { schema, partitions }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn partitions(&self) -> &[RecordBatch] {
        &self.partitions
    }

    pub fn row_count(&self) -> usize {
        self.partitions.iter().map(RecordBatch::num_rows).sum()
    }

    /// Run the full cleaning pipeline.
    pub fn clean(self) -> Result<Self, TransformError> {
        debug!("Starting data cleaning");
        let fallback_schema = self.schema;
        let partitions = self
            .partitions
            .into_par_iter()
            .map(|batch| normalize_columns(&batch))
            .collect::<Result<Vec<_>, _>>()?;

        let missing: usize = partitions
            .iter()
            .filter_map(|batch| batch.column_by_name(raw::PUBLISHED_AT))
            .map(|column| column.null_count())
            .sum();
        if missing > 0 {
            return Err(TransformError::MissingPublishedAt { count: missing });
        }

        let partitions = partitions
            .into_par_iter()
            .map(|batch| fill_nulls(&batch))
            .collect::<Result<Vec<_>, _>>()?;

        let partitions = drop_duplicates(&partitions)?;

        debug!("Converting publishedAt to UTC timestamps");
        let partitions = partitions
            .into_par_iter()
            .map(|batch| parse_published_at(&batch))
            .collect::<Result<Vec<_>, _>>()?;

        // differently written instants of the same moment only collide once parsed
        let partitions = drop_duplicates(&partitions)?;

        let schema = partitions
            .first()
            .map(RecordBatch::schema)
            .unwrap_or(fallback_schema);
        Ok(Self { schema, partitions })
    }

    /// Save the partitions as the cleaned snapshot, replacing any previous one.
    pub fn save(&self, path: &Path) -> Result<(), TransformError> {
        cleaned::write(path, self.schema().clone(), self.partitions()).map_err(TransformError::Save)
    }
}

/// Run the transformation stage end to end.
///
/// # Errors
///
/// Any [`TransformError`]; on failure the previous cleaned snapshot is left
/// untouched.
#[instrument(level = "info", skip_all)]
pub fn transform(
    settings: &TransformSettings,
    staging: &StagingPaths,
) -> Result<TransformSummary, TransformError> {
    info!("Starting transforming data");
    let t0 = Instant::now();

    let session = TransformSession::start(staging, settings)?;
    let rows_in = session.row_count();

    let session = session.clean().inspect_err(|e| {
        error!(error = %e, "An error occurred while cleaning data");
    })?;
    let rows_out = session.row_count();

    info!("Trying to save dataframe back to a parquet file");
    session.save(&staging.cleaned()).inspect_err(|e| {
        error!(error = %e, "An error occurred while saving data_transformed.parquet");
    })?;

    let summary = TransformSummary {
        rows_in,
        rows_out,
        duplicates_removed: rows_in - rows_out,
    };
    info!(
        rows_in,
        rows_out,
        duplicates_removed = summary.duplicates_removed,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Transformation completed"
    );
    Ok(summary)
}

/// Drop the index and `source.id` columns and rename `source.name`.
///
/// Columns already in cleaned form pass through unchanged.
pub fn normalize_columns(batch: &RecordBatch) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(schema.fields().len());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        match field.name().as_str() {
            raw::INDEX_COLUMN | raw::SOURCE_ID => continue,
            raw::SOURCE_NAME => fields.push(Arc::new(
                field.as_ref().clone().with_name(cleaned::SOURCE_NAME),
            )),
            _ => fields.push(field.clone()),
        }
        columns.push(column.clone());
    }

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    RecordBatch::try_new(Arc::new(schema), columns)
}

/// Replace every null in every string column with [`SENTINEL`].
pub fn fill_nulls(batch: &RecordBatch) -> Result<RecordBatch, ArrowError> {
    let columns = batch
        .columns()
        .iter()
        .map(|column| match column.as_string_opt::<i32>() {
            Some(strings) if strings.null_count() > 0 => {
                let filled: StringArray = strings
                    .iter()
                    .map(|value| Some(value.unwrap_or(SENTINEL)))
                    .collect();
                Arc::new(filled) as ArrayRef
            }
            _ => column.clone(),
        })
        .collect();
    RecordBatch::try_new(batch.schema(), columns)
}

/// Keep the first occurrence of every distinct row across all partitions.
pub fn drop_duplicates(partitions: &[RecordBatch]) -> Result<Vec<RecordBatch>, ArrowError> {
    let Some(first) = partitions.first() else {
        return Ok(Vec::new());
    };
    let sort_fields = first
        .schema()
        .fields()
        .iter()
        .map(|field| SortField::new(field.data_type().clone()))
        .collect();
    let converter = RowConverter::new(sort_fields)?;

    let mut seen: HashSet<OwnedRow> = HashSet::new();
    let mut deduplicated = Vec::with_capacity(partitions.len());
    for batch in partitions {
        let rows = converter.convert_columns(batch.columns())?;
        let keep: BooleanArray = rows.iter().map(|row| Some(seen.insert(row.owned()))).collect();
        deduplicated.push(filter_record_batch(batch, &keep)?);
    }
    Ok(deduplicated)
}

/// Cast `publishedAt` from text to a UTC timestamp.
///
/// The cast is strict: any value that does not parse fails the whole batch
/// instead of turning into a null. Already-parsed columns are left as-is.
pub fn parse_published_at(batch: &RecordBatch) -> Result<RecordBatch, TransformError> {
    let schema = batch.schema();
    let Ok(index) = schema.index_of(cleaned::PUBLISHED_AT) else {
        return Ok(batch.clone());
    };
    let field = schema.field(index);
    if field.data_type() != &DataType::Utf8 {
        return Ok(batch.clone());
    }

    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let parsed = cast_with_options(batch.column(index), &cleaned::published_at_type(), &options)
        .map_err(TransformError::TimestampParse)?;

    let mut fields: Vec<Arc<Field>> = schema.fields().iter().cloned().collect();
    fields[index] = Arc::new(
        field
            .clone()
            .with_data_type(cleaned::published_at_type()),
    );
    let mut columns = batch.columns().to_vec();
    columns[index] = parsed;

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}
