//! Loading stage: cleaned snapshot into the document store.
//!
//! Each run writes into a collection named after its run date
//! (`YYYY_MM_DD`), so every day lands in its own partition. A load replaces
//! whatever the collection already held, so rerunning a day (after a failure
//! or a partial insert) never duplicates documents. The store is
//! health-checked before anything is read or written.

use crate::config::{LoadSettings, StagingPaths};
use crate::error::LoadError;
use crate::models::RunDate;
use crate::snapshots::cleaned;
use crate::store::DocumentStore;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub collection: String,
    /// Documents left over from an earlier load of the same day.
    pub replaced: u64,
    pub inserted: u64,
}

/// Run the loading stage against `store`.
///
/// # Arguments
///
/// * `settings` - Target database
/// * `staging` - Where the cleaned snapshot is read from
/// * `run_date` - Selects the daily collection
/// * `store` - Any [`DocumentStore`]
///
/// # Errors
///
/// - [`LoadError::Connection`] if the store fails its health check; nothing
///   is cleared or inserted
/// - [`LoadError::Snapshot`] if the cleaned snapshot is missing or malformed;
///   the collection is left as it was
/// - [`LoadError::Clear`] if the previous contents cannot be removed
/// - [`LoadError::Insert`] if the bulk insert fails. Inserts are ordered, so
///   documents before the failing one may already be stored.
#[instrument(level = "info", skip_all, fields(database = %settings.database_name, run_date = %run_date))]
pub async fn load<S>(
    settings: &LoadSettings,
    staging: &StagingPaths,
    run_date: RunDate,
    store: &S,
) -> Result<LoadSummary, LoadError>
where
    S: DocumentStore,
{
    info!("Starting loading data into the database");
    let t0 = Instant::now();

    let databases = store.list_database_names().await.map_err(|e| {
        error!(error = %e, "Database health check failed");
        LoadError::Connection(e)
    })?;
    info!(databases = databases.len(), "Connected to the database");

    let articles = cleaned::read_articles(&staging.cleaned()).inspect_err(|e| {
        error!(error = %e, "An error occurred while reading data_transformed.parquet");
    })?;

    let collection = run_date.collection_name();
    let replaced = store
        .clear_collection(&settings.database_name, &collection)
        .await
        .map_err(|source| {
            error!(%collection, error = %source, "Could not clear collection before loading");
            LoadError::Clear {
                collection: collection.clone(),
                source,
            }
        })?;
    if replaced > 0 {
        info!(%collection, replaced, "Removed documents from an earlier load of this day");
    }

    if articles.is_empty() {
        warn!(%collection, "Cleaned snapshot is empty; skipping insert");
        return Ok(LoadSummary {
            collection,
            replaced,
            inserted: 0,
        });
    }

    let inserted = store
        .insert_many(&settings.database_name, &collection, &articles)
        .await
        .map_err(|source| {
            error!(
                %collection,
                error = %source,
                "Bulk insert failed; collection holds a partial load until the day is rerun"
            );
            LoadError::Insert {
                collection: collection.clone(),
                source,
            }
        })?;

    info!(
        %collection,
        inserted,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Data successfully loaded to the database"
    );
    Ok(LoadSummary {
        collection,
        replaced,
        inserted,
    })
}
