//! Bulk ingestion of snapshot files at start-up.

pub mod snapshot;

use crate::consistency::Denormalizer;
use crate::core::{DbError, Result};
use crate::model::{self, EntityKind, declare_collections, merge_json};
use crate::storage::EntityStore;
use snapshot::{JsonRecord, parse_records, snapshot_files};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

pub const OPTIONS_FILE: &str = "options.txt";
/// "Current time" for age filters when no options file is shipped.
pub const DEFAULT_NOW: i64 = 1_503_333_691;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub users: usize,
    pub locations: usize,
    pub visits: usize,
    pub files: usize,
    /// Unix seconds age filters are measured against.
    pub now: i64,
}

impl LoadReport {
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::User => self.users,
            EntityKind::Location => self.locations,
            EntityKind::Visit => self.visits,
        }
    }

    fn count_mut(&mut self, kind: EntityKind) -> &mut usize {
        match kind {
            EntityKind::User => &mut self.users,
            EntityKind::Location => &mut self.locations,
            EntityKind::Visit => &mut self.visits,
        }
    }
}

pub struct BulkLoader {
    store: Arc<dyn EntityStore>,
    denormalizer: Denormalizer,
}

impl BulkLoader {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            denormalizer: Denormalizer::new(Arc::clone(&store)),
            store,
        }
    }

    /// Declares the collections and ingests every snapshot in `dir`.
    ///
    /// Users and locations are loaded before visits so each visit can be
    /// denormalized before its first insert. Any failure aborts the load.
    pub async fn load_data(&self, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let dir = dir.as_ref();
        declare_collections(self.store.as_ref()).await?;

        let mut report = LoadReport::default();
        for kind in EntityKind::LOAD_ORDER {
            for path in snapshot_files(dir, kind.collection()).await? {
                let bytes = fs::read(&path)
                    .await
                    .map_err(|err| DbError::load(&path, format!("failed to read: {}", err)))?;
                info!(file = %path.display(), bytes = bytes.len(), "Loading snapshot");

                let records = parse_records(&bytes, kind.collection(), &path)?;
                for fields in &records {
                    self.ingest(kind, fields, &path).await?;
                }

                report.files += 1;
                *report.count_mut(kind) += records.len();
            }
        }

        report.now = read_options(dir).await?;
        info!(
            users = report.users,
            locations = report.locations,
            visits = report.visits,
            files = report.files,
            now = report.now,
            "Data loaded"
        );
        Ok(report)
    }

    async fn ingest(&self, kind: EntityKind, fields: &JsonRecord, path: &Path) -> Result<()> {
        if !fields.contains_key(model::ID) {
            return Err(DbError::load(path, format!("{} record without an id", kind)));
        }

        let mut record = self.store.new_item(kind.collection()).await?;
        merge_json(&mut record, kind, fields).map_err(|err| match err {
            DbError::Malformed(message) => DbError::load(path, message),
            other => other,
        })?;

        if kind == EntityKind::Visit {
            self.denormalizer.denormalize(&mut record).await?;
        }

        self.store.upsert(record).await?;
        Ok(())
    }
}

/// First whitespace-separated token of `options.txt`, in unix seconds.
pub async fn read_options(dir: &Path) -> Result<i64> {
    let path = dir.join(OPTIONS_FILE);
    let text = match fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(file = %path.display(), default = DEFAULT_NOW, "options.txt not found");
            return Ok(DEFAULT_NOW);
        }
        Err(err) => return Err(DbError::load(&path, format!("failed to read: {}", err))),
    };

    let token = text
        .split_whitespace()
        .next()
        .ok_or_else(|| DbError::load(&path, "options file is empty"))?;
    let now = token
        .parse::<i64>()
        .map_err(|_| DbError::load(&path, format!("invalid current time '{}'", token)))?;

    info!(now, "now from options.txt");
    Ok(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_options_missing_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_options(dir.path()).await.unwrap(), DEFAULT_NOW);
    }

    #[tokio::test]
    async fn test_read_options_first_token() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OPTIONS_FILE), "1500000000\n1\n").unwrap();
        assert_eq!(read_options(dir.path()).await.unwrap(), 1_500_000_000);
    }

    #[tokio::test]
    async fn test_read_options_garbage_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OPTIONS_FILE), "soon").unwrap();
        let err = read_options(dir.path()).await.unwrap_err();
        assert!(matches!(err, DbError::Load { .. }));
    }
}
