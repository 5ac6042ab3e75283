use super::query::{Query, QueryResults};
use crate::core::{CollectionSchema, Record, Result, RowId};
use async_trait::async_trait;
use std::sync::Arc;

/// Entity store seam - everything the consistency layer needs from storage
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Declare a collection together with its indexed fields
    async fn create_collection(&self, schema: CollectionSchema) -> Result<()>;

    /// Get the schema of a declared collection
    async fn schema(&self, collection: &str) -> Result<Arc<CollectionSchema>>;

    /// Filter, sort, limit and aggregate over one collection
    async fn select(&self, query: &Query) -> Result<QueryResults>;

    /// Fetch a shared record by its internal row id
    async fn get_item(&self, collection: &str, row_id: RowId) -> Result<Arc<Record>>;

    /// Construct a detached record pre-populated with the collection defaults
    async fn new_item(&self, collection: &str) -> Result<Record>;

    /// Insert if the primary key is absent, replace otherwise
    async fn upsert(&self, record: Record) -> Result<RowId>;

    /// Number of records in a collection
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Check if a collection exists
    async fn collection_exists(&self, collection: &str) -> bool;
}
