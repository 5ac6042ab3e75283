use crate::model::EntityKind;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// `last_write_ms` value meaning "no write since the last warmup pass".
pub const IDLE: u64 = 0;

pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(IDLE)
}

/// Ids touched by writes since the last reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingUpdates {
    pub visits: BTreeSet<i64>,
    pub users: BTreeSet<i64>,
    pub locations: BTreeSet<i64>,
}

impl PendingUpdates {
    pub fn insert(&mut self, kind: EntityKind, id: i64) {
        match kind {
            EntityKind::User => self.users.insert(id),
            EntityKind::Location => self.locations.insert(id),
            EntityKind::Visit => self.visits.insert(id),
        };
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty() && self.users.is_empty() && self.locations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.visits.len() + self.users.len() + self.locations.len()
    }
}

/// Process-wide record of write activity, shared by the write coordinator
/// and the warmup scheduler.
#[derive(Debug, Default)]
pub struct WriteActivity {
    last_write_ms: AtomicU64,
    pending: Mutex<PendingUpdates>,
}

impl WriteActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&self, at_ms: u64) {
        self.last_write_ms.store(at_ms.max(1), Ordering::SeqCst);
    }

    /// `None` while idle.
    pub fn last_write(&self) -> Option<u64> {
        match self.last_write_ms.load(Ordering::SeqCst) {
            IDLE => None,
            at => Some(at),
        }
    }

    /// Returns to idle only if no write happened since `observed` was read.
    pub fn reset_idle_if(&self, observed: u64) -> bool {
        self.last_write_ms
            .compare_exchange(observed, IDLE, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub async fn mark_pending(&self, kind: EntityKind, id: i64) {
        self.pending.lock().await.insert(kind, id);
    }

    pub async fn take_pending(&self) -> PendingUpdates {
        std::mem::take(&mut *self.pending.lock().await)
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }
}
