//! Extraction stage: page through the news API and write the raw snapshot.
//!
//! Pages are requested sequentially starting at 1 until a page comes back
//! with no articles. Everything is accumulated in memory and written once at
//! the end, so a failure on any page leaves no raw snapshot behind.

use crate::api::{NewsApiClient, PageSource, Throttled};
use crate::config::{ExtractSettings, StagingPaths};
use crate::error::ExtractError;
use crate::models::{RawArticle, RunDate};
use crate::snapshots::raw;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Error code the API returns when paging beyond the results it will serve.
const RESULTS_EXHAUSTED: &str = "maximumResultsReached";

/// Outcome of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Requests made, including the final empty page.
    pub requests: u32,
    pub articles: usize,
}

/// Fetch every page for the run from `source`.
///
/// Stops at the first page whose `articles` list is empty or absent. A
/// `maximumResultsReached` API error after the first page also ends
/// pagination, since the API refuses to serve further pages for the query.
///
/// # Errors
///
/// - Any error from `source`
/// - [`ExtractError::PageLimitExceeded`] if `max_pages` pages were fetched and
///   the last one still carried articles
pub async fn collect_articles<S>(
    source: &S,
    max_pages: u32,
) -> Result<(Vec<RawArticle>, u32), ExtractError>
where
    S: PageSource,
{
    let mut articles = Vec::new();

    for page in 1..=max_pages {
        let batch = match source.fetch_page(page).await {
            Ok(api_page) => {
                if page == 1 {
                    info!(total_results = ?api_page.totalResults, "API reports matching articles");
                }
                api_page.articles.unwrap_or_default()
            }
            Err(ExtractError::Api { code, message, .. }) if page > 1 && code == RESULTS_EXHAUSTED => {
                warn!(page, %message, "API stopped serving results; ending pagination");
                return Ok((articles, page));
            }
            Err(e) => return Err(e),
        };

        if batch.is_empty() {
            debug!(page, "Empty page; pagination complete");
            return Ok((articles, page));
        }

        debug!(page, count = batch.len(), "Fetched page");
        articles.extend(batch);
    }

    Err(ExtractError::PageLimitExceeded { max_pages })
}

/// Run the extraction stage end to end.
///
/// # Arguments
///
/// * `settings` - API endpoint, credential and pagination limits
/// * `staging` - Where the raw snapshot is written
/// * `run_date` - The day being extracted, sent as the `from` parameter
///
/// # Returns
///
/// The number of requests made and articles written.
///
/// # Errors
///
/// Any [`ExtractError`]. On failure the raw snapshot is not written.
#[instrument(level = "info", skip_all, fields(run_date = %run_date))]
pub async fn extract(
    settings: &ExtractSettings,
    staging: &StagingPaths,
    run_date: RunDate,
) -> Result<ExtractSummary, ExtractError> {
    info!("Starting data extraction");
    let t0 = Instant::now();

    let client = NewsApiClient::new(settings, run_date)?;
    let source = Throttled::new(client, settings.page_delay);

    let (articles, requests) = collect_articles(&source, settings.max_pages)
        .await
        .inspect_err(|e| error!(error = %e, "An error occurred while fetching articles"))?;

    info!(count = articles.len(), "Writing data to a parquet file");
    raw::write(&staging.raw(), &articles).inspect_err(|e| {
        error!(error = %e, "An error occurred while saving data to a parquet file");
    })?;

    let summary = ExtractSummary {
        requests,
        articles: articles.len(),
    };
    info!(
        requests,
        articles = summary.articles,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Extraction completed"
    );
    Ok(summary)
}
