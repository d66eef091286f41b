use super::DocumentStore;
use crate::error::StoreError;
use crate::models::Article;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

type Collections = BTreeMap<String, BTreeMap<String, Vec<Article>>>;

/// In-memory [`DocumentStore`] that records every insert.
#[derive(Debug, Default)]
pub struct MemoryStore {
    reachable: bool,
    databases: RwLock<Collections>,
    insert_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            reachable: true,
            ..Default::default()
        }
    }

    /// A store whose every operation fails as if the server were down.
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub async fn collection(&self, database: &str, collection: &str) -> Vec<Article> {
        self.databases
            .read()
            .await
            .get(database)
            .and_then(|db| db.get(collection))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn collection_names(&self, database: &str) -> Vec<String> {
        self.databases
            .read()
            .await
            .get(database)
            .map(|db| db.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.reachable {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn list_database_names(&self) -> Result<Vec<String>, StoreError> {
        self.check_reachable()?;
        Ok(self.databases.read().await.keys().cloned().collect())
    }

    async fn clear_collection(&self, database: &str, collection: &str) -> Result<u64, StoreError> {
        self.check_reachable()?;
        let removed = self
            .databases
            .write()
            .await
            .get_mut(database)
            .and_then(|db| db.get_mut(collection))
            .map(|docs| docs.drain(..).count())
            .unwrap_or(0);
        Ok(removed as u64)
    }

    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        articles: &[Article],
    ) -> Result<u64, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.databases
            .write()
            .await
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default()
            .extend_from_slice(articles);
        Ok(articles.len() as u64)
    }
}
