use super::DocumentStore;
use crate::config::LoadSettings;
use crate::error::StoreError;
use crate::models::Article;
use mongodb::bson::{self, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::Client;
use std::fmt;
use tracing::{debug, instrument};

/// MongoDB-backed [`DocumentStore`].
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Build a client from the connection string.
    ///
    /// The driver connects lazily; nothing touches the network until the
    /// first operation, so callers should follow up with
    /// [`DocumentStore::list_database_names`] to verify the server is up.
    ///
    /// # Errors
    ///
    /// [`StoreError::Mongo`] if the connection string is malformed.
    #[instrument(level = "debug", skip_all)]
    pub async fn connect(settings: &LoadSettings) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&settings.connection_string).await?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.server_selection_timeout = Some(settings.server_selection_timeout);
        let client = Client::with_options(options)?;
        Ok(Self { client })
    }
}

impl fmt::Debug for MongoStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // connection string may carry credentials
        f.debug_struct("MongoStore").finish_non_exhaustive()
    }
}

/// The BSON document stored for one article. `publishedAt` is a native
/// datetime so range queries work server-side.
pub fn to_document(article: &Article) -> Document {
    doc! {
        "source_name": article.source_name.as_str(),
        "author": article.author.as_str(),
        "title": article.title.as_str(),
        "description": article.description.as_str(),
        "url": article.url.as_str(),
        "urlToImage": article.url_to_image.as_str(),
        "publishedAt": bson::DateTime::from_millis(article.published_at.timestamp_millis()),
        "content": article.content.as_str(),
    }
}

impl DocumentStore for MongoStore {
    async fn list_database_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.client.list_database_names().await?)
    }

    #[instrument(level = "debug", skip(self))]
    async fn clear_collection(&self, database: &str, collection: &str) -> Result<u64, StoreError> {
        let result = self
            .client
            .database(database)
            .collection::<Document>(collection)
            .delete_many(doc! {})
            .await?;
        Ok(result.deleted_count)
    }

    #[instrument(level = "debug", skip(self, articles), fields(count = articles.len()))]
    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        articles: &[Article],
    ) -> Result<u64, StoreError> {
        let documents: Vec<Document> = articles.iter().map(to_document).collect();
        let result = self
            .client
            .database(database)
            .collection::<Document>(collection)
            .insert_many(documents)
            .await?;
        debug!(inserted = result.inserted_ids.len(), "Bulk insert acknowledged");
        Ok(result.inserted_ids.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SENTINEL;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_document_shape() {
        let published_at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let article = Article {
            source_name: "Wired".to_string(),
            author: SENTINEL.to_string(),
            title: "Hello".to_string(),
            description: "Desc".to_string(),
            url: "https://example.com/a".to_string(),
            url_to_image: SENTINEL.to_string(),
            published_at,
            content: "Body".to_string(),
        };

        let document = to_document(&article);
        let keys: Vec<&str> = document.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "source_name",
                "author",
                "title",
                "description",
                "url",
                "urlToImage",
                "publishedAt",
                "content"
            ]
        );
        assert_eq!(document.get_str("urlToImage").unwrap(), "unknown");
        assert_eq!(
            document.get_datetime("publishedAt").unwrap().timestamp_millis(),
            published_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_malformed_connection_string() {
        let settings = LoadSettings {
            connection_string: "not-a-uri".to_string(),
            database_name: "news".to_string(),
            server_selection_timeout: std::time::Duration::from_millis(100),
        };
        assert!(matches!(
            MongoStore::connect(&settings).await,
            Err(StoreError::Mongo(_))
        ));
    }
}
