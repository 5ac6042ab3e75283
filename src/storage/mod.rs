pub mod collection;
pub mod engine;
pub mod memory;
pub mod query;

pub use collection::Collection;
pub use engine::EntityStore;
pub use memory::InMemoryStore;
pub use query::{AggregateKind, Cond, Item, OpType, Query, QueryResults};
