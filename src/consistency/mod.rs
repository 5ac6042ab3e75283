//! Keeps the shadow fields of visits consistent with their users and
//! locations.
//!
//! - [`WriteCoordinator`] runs every client write under per-collection guards
//!   and either cascades shadow-field updates immediately or records the
//!   touched ids for later.
//! - [`Denormalizer`] performs the actual lookups and rewrites.
//! - [`WarmupScheduler`] reconciles recorded ids once writes go quiet and
//!   primes the visit sort path.
//! - [`WriteActivity`] is the state the coordinator and scheduler share.

pub mod activity;
pub mod coordinator;
pub mod denormalize;
pub mod locks;
pub mod warmup;

pub use activity::{IDLE, PendingUpdates, WriteActivity, now_ms};
pub use coordinator::{WriteCoordinator, WriteTarget};
pub use denormalize::Denormalizer;
pub use locks::{Access, CollectionLocks, LockPlan};
pub use warmup::{WarmupReport, WarmupScheduler, WarmupSettings};
