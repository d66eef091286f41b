//! Data models for articles as they move through the pipeline.
//!
//! This module defines the records shared by all three stages:
//! - [`ApiPage`]: One page of the search API response
//! - [`RawArticle`]: An article exactly as the API returned it
//! - [`Article`]: A cleaned article as read back from the transformed snapshot
//! - [`RunDate`]: The calendar date a run is scoped to
//!
//! The API-facing models use camelCase field names to match the JSON returned
//! by the news API, hence the `#[allow(non_snake_case)]` attributes.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Deserialize;
use std::fmt;

/// The sentinel substituted for every null value during cleaning.
pub const SENTINEL: &str = "unknown";

/// One page of results from the news search API.
///
/// A successful page carries `status = "ok"` and a (possibly empty) list of
/// articles. Failed requests carry `status = "error"` together with an error
/// `code` and human readable `message`.
#[allow(non_snake_case)]
#[derive(Debug, Default, Deserialize)]
pub struct ApiPage {
    /// `"ok"` or `"error"`.
    pub status: Option<String>,
    /// Total number of hits for the query, across all pages.
    pub totalResults: Option<u64>,
    /// The articles on this page. Absent on error responses.
    pub articles: Option<Vec<RawArticle>>,
    /// Machine readable error code (error responses only).
    pub code: Option<String>,
    /// Error description (error responses only).
    pub message: Option<String>,
}

impl ApiPage {
    /// Whether the API reported a failure in the response body.
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

/// The publisher an article came from, nested under `source` in the API JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct ArticleSource {
    /// Publisher identifier; frequently `null`.
    pub id: Option<String>,
    /// Display name of the publisher.
    pub name: Option<String>,
}

/// A news article as returned by the search API, before any cleaning.
///
/// Every field is optional: the API omits or nulls fields freely, and the
/// raw snapshot preserves those nulls for the transformer to deal with.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct RawArticle {
    /// The publisher, flattened into `source.id` / `source.name` columns.
    #[serde(default)]
    pub source: ArticleSource,
    /// Byline.
    pub author: Option<String>,
    /// Headline.
    pub title: Option<String>,
    /// Short description or lede.
    pub description: Option<String>,
    /// Canonical article URL.
    pub url: Option<String>,
    /// Lead image URL.
    pub urlToImage: Option<String>,
    /// ISO-8601 publication timestamp, still text at this stage.
    pub publishedAt: Option<String>,
    /// Truncated article body.
    pub content: Option<String>,
}

/// A cleaned article, as read from the transformed snapshot and loaded into
/// the document store.
///
/// No field is null: missing values were replaced with [`SENTINEL`] during
/// cleaning, and `published_at` is a parsed UTC instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub source_name: String,
    pub author: String,
    pub title: String,
    pub description: String,
    pub url: String,
    /// Stored as `urlToImage`.
    pub url_to_image: String,
    /// Stored as `publishedAt`.
    pub published_at: DateTime<Utc>,
    pub content: String,
}

/// The calendar date a run is scoped to.
///
/// Computed once at startup from the local clock and passed to every stage,
/// so a run that straddles midnight still queries and loads a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunDate(NaiveDate);

impl RunDate {
    /// Today's date on the local clock.
    pub fn today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// `YYYY-MM-DD`, the lower bound passed to the API as `from`.
    pub fn query_param(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// `YYYY_MM_DD`, the name of the daily partition collection.
    pub fn collection_name(&self) -> String {
        self.0.format("%Y_%m_%d").to_string()
    }
}

impl fmt::Display for RunDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query_param())
    }
}
