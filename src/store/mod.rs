//! Document store abstraction for the loader.
//!
//! - [`DocumentStore`]: the operations the loader needs
//! - [`MongoStore`]: MongoDB implementation
//!
//! Tests drive the loader through an in-memory store instead.

#[cfg(test)]
pub mod memory;
pub mod mongo;

pub use mongo::MongoStore;

use crate::error::StoreError;
use crate::models::Article;

/// A store that accepts batches of cleaned articles into named collections.
pub trait DocumentStore {
    /// List database names. Used as a liveness check before any write.
    async fn list_database_names(&self) -> Result<Vec<String>, StoreError>;

    /// Remove every document from `database.collection`. Returns the number
    /// of documents removed; a missing collection counts as empty.
    async fn clear_collection(&self, database: &str, collection: &str) -> Result<u64, StoreError>;

    /// Insert `articles` into `database.collection`, creating the collection
    /// if needed. Returns the number of documents inserted.
    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        articles: &[Article],
    ) -> Result<u64, StoreError>;
}
