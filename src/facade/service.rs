use crate::config::{AppConfig, IntegrityPolicy, Propagation};
use crate::consistency::{WarmupScheduler, WarmupSettings, WriteActivity, WriteCoordinator, now_ms};
use crate::core::Result;
use crate::loader::{BulkLoader, DEFAULT_NOW, LoadReport};
use crate::model::declare_collections;
use crate::storage::{EntityStore, InMemoryStore};
use crate::web::{AppState, build_router};
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The assembled service: one store, the write coordinator in front of it,
/// the loader that fills it and the scheduler that keeps it reconciled.
pub struct TravelService {
    store: Arc<dyn EntityStore>,
    coordinator: Arc<WriteCoordinator>,
    warmup: WarmupSettings,
    now: i64,
}

impl TravelService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(
            Arc::new(InMemoryStore::new()),
            config.propagation,
            config.integrity,
            config.warmup(),
        )
    }

    pub fn with_store(
        store: Arc<dyn EntityStore>,
        propagation: Propagation,
        integrity: IntegrityPolicy,
        warmup: WarmupSettings,
    ) -> Self {
        let coordinator = Arc::new(WriteCoordinator::new(
            Arc::clone(&store),
            Arc::new(WriteActivity::new()),
            propagation,
            integrity,
        ));
        Self {
            store,
            coordinator,
            warmup,
            now: DEFAULT_NOW,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<WriteCoordinator> {
        &self.coordinator
    }

    /// Unix seconds age filters are measured against.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// Declares the collections without loading any data.
    pub async fn declare(&self) -> Result<()> {
        declare_collections(self.store.as_ref()).await
    }

    /// Loads the snapshot and counts it as a write, so the first warmup pass
    /// runs once the quiescence window after startup has passed.
    pub async fn load(&mut self, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let report = BulkLoader::new(Arc::clone(&self.store)).load_data(dir).await?;
        self.now = report.now;
        self.coordinator.activity().touch(now_ms());
        Ok(report)
    }

    pub fn router(&self) -> Router {
        build_router(AppState::new(Arc::clone(&self.coordinator), self.now))
    }

    pub fn warmup_scheduler(&self) -> WarmupScheduler {
        WarmupScheduler::new(Arc::clone(&self.coordinator), self.warmup)
    }

    pub fn spawn_warmup(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.warmup_scheduler().spawn(shutdown)
    }
}
