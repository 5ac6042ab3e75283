// ============================================================================
// travelsdb Library
// ============================================================================

pub mod config;
pub mod consistency;
pub mod core;
pub mod facade;
pub mod loader;
pub mod model;
pub mod storage;
pub mod web;

// Re-export main types for convenience
pub use config::{AppConfig, IntegrityPolicy, Propagation};
pub use consistency::{Denormalizer, WarmupScheduler, WriteCoordinator, WriteTarget};
pub use crate::core::{DbError, Record, Result, Value};
pub use facade::TravelService;
pub use loader::{BulkLoader, LoadReport};
pub use model::EntityKind;
pub use storage::{EntityStore, InMemoryStore, Query};
