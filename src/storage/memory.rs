use super::collection::Collection;
use super::engine::EntityStore;
use super::query::{Query, QueryResults};
use crate::core::{CollectionSchema, DbError, Record, Result, RowId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory entity store.
///
/// Every collection sits behind its own lock, so a long scan of `visits`
/// does not hold up point reads of `users`. The map of collections is only
/// write-locked while a collection is declared.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Arc<RwLock<Collection>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    async fn collection(&self, name: &str) -> Result<Arc<RwLock<Collection>>> {
        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::CollectionNotFound(name.to_string()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn create_collection(&self, schema: CollectionSchema) -> Result<()> {
        let mut collections = self.collections.write().await;
        let name = schema.name().to_string();

        if collections.contains_key(&name) {
            return Err(DbError::CollectionExists(name));
        }

        let collection = Collection::new(Arc::new(schema));
        collections.insert(name, Arc::new(RwLock::new(collection)));
        Ok(())
    }

    async fn schema(&self, collection: &str) -> Result<Arc<CollectionSchema>> {
        let handle = self.collection(collection).await?;
        let collection = handle.read().await;
        Ok(Arc::clone(collection.schema()))
    }

    async fn select(&self, query: &Query) -> Result<QueryResults> {
        let handle = self.collection(query.collection()).await?;
        let collection = handle.read().await;
        collection.select(query)
    }

    async fn get_item(&self, collection: &str, row_id: RowId) -> Result<Arc<Record>> {
        let handle = self.collection(collection).await?;
        let guard = handle.read().await;
        guard
            .get(row_id)
            .ok_or_else(|| DbError::not_found(format!("{} row {}", collection, row_id)))
    }

    async fn new_item(&self, collection: &str) -> Result<Record> {
        Ok(self.schema(collection).await?.new_record())
    }

    async fn upsert(&self, record: Record) -> Result<RowId> {
        let handle = self.collection(record.collection()).await?;
        let mut collection = handle.write().await;
        collection.upsert(record)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let handle = self.collection(collection).await?;
        let collection = handle.read().await;
        Ok(collection.len())
    }

    async fn collection_exists(&self, collection: &str) -> bool {
        self.collections.read().await.contains_key(collection)
    }
}
