use super::activity::{WriteActivity, now_ms};
use super::denormalize::Denormalizer;
use super::locks::{Access, CollectionLocks, LockPlan};
use crate::config::{IntegrityPolicy, Propagation};
use crate::core::{DbError, Record, Result};
use crate::model::{self, EntityKind, merge_json};
use crate::storage::{Cond, EntityStore, Query};
use std::sync::Arc;
use tracing::{debug, error};

/// Guards for any pass that rewrites visits from users and locations.
const REFRESH_PLAN: LockPlan = LockPlan {
    users: Some(Access::Read),
    locations: Some(Access::Read),
    visits: Some(Access::Write),
};

/// Target of a write: `new` or the id of an existing entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    New,
    Existing(i64),
}

impl WriteTarget {
    /// Parses the path segment of a write request. Anything that is neither
    /// `new` nor an integer names no entity.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw == "new" {
            return Ok(Self::New);
        }
        raw.parse::<i64>()
            .map(Self::Existing)
            .map_err(|_| DbError::not_found(format!("no entity '{}'", raw)))
    }
}

/// Serializes client writes per collection and keeps visit shadow fields in
/// step with them.
pub struct WriteCoordinator {
    store: Arc<dyn EntityStore>,
    denormalizer: Denormalizer,
    locks: CollectionLocks,
    activity: Arc<WriteActivity>,
    propagation: Propagation,
    integrity: IntegrityPolicy,
}

impl WriteCoordinator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        activity: Arc<WriteActivity>,
        propagation: Propagation,
        integrity: IntegrityPolicy,
    ) -> Self {
        Self {
            denormalizer: Denormalizer::new(Arc::clone(&store)),
            store,
            locks: CollectionLocks::new(),
            activity,
            propagation,
            integrity,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn activity(&self) -> &Arc<WriteActivity> {
        &self.activity
    }

    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// Creates or updates one entity from a JSON object body.
    ///
    /// The stored record is only replaced once the merged copy is complete
    /// and, for visits, denormalized; any earlier failure leaves the store
    /// untouched.
    pub async fn create_or_update(
        &self,
        kind: EntityKind,
        target: WriteTarget,
        body: &serde_json::Value,
    ) -> Result<()> {
        let fields = body
            .as_object()
            .ok_or_else(|| DbError::malformed("request body must be a JSON object"))?;

        let _guards = self.locks.acquire(self.write_plan(kind)).await;

        let mut record = match target {
            WriteTarget::Existing(id) => {
                let results = self
                    .store
                    .select(&Query::new(kind.collection()).filter(model::ID, Cond::Eq, id))
                    .await?;
                let item = results
                    .single()
                    .ok_or_else(|| DbError::not_found(format!("{} {}", kind, id)))?;
                Record::clone(&item.record)
            }
            WriteTarget::New => {
                if !fields.contains_key(model::ID) {
                    return Err(DbError::malformed(format!("new {} requires an id", kind)));
                }
                self.store.new_item(kind.collection()).await?
            }
        };

        merge_json(&mut record, kind, fields)?;
        if let WriteTarget::Existing(id) = target {
            record.set(model::ID, id)?;
        }
        let id = record.id()?;

        if kind == EntityKind::Visit {
            self.denormalizer
                .denormalize(&mut record)
                .await
                .map_err(|err| self.escalate(err))?;
        }

        self.store.upsert(record).await?;
        self.activity.touch(now_ms());

        match self.propagation {
            Propagation::Immediate => {
                self.denormalizer
                    .cascade(kind, id)
                    .await
                    .map_err(|err| self.escalate(err))?;
            }
            Propagation::Batched => self.activity.mark_pending(kind, id).await,
        }

        debug!(%kind, id, ?target, "write applied");
        Ok(())
    }

    /// Re-denormalizes one stored visit under the refresh guards.
    pub async fn denormalize_visit(&self, visit_id: i64) -> Result<()> {
        let _guards = self.locks.acquire(REFRESH_PLAN).await;
        self.denormalizer
            .denormalize_by_id(visit_id)
            .await
            .map_err(|err| self.escalate(err))
    }

    /// Drains the pending set and refreshes every affected visit.
    pub async fn reconcile_pending(&self) -> Result<usize> {
        let _guards = self.locks.acquire(REFRESH_PLAN).await;
        let pending = self.activity.take_pending().await;
        self.denormalizer
            .reconcile(&pending)
            .await
            .map_err(|err| self.escalate(err))
    }

    fn write_plan(&self, kind: EntityKind) -> LockPlan {
        match (kind, self.propagation) {
            (EntityKind::Visit, _) => REFRESH_PLAN,
            (EntityKind::User, Propagation::Batched) => LockPlan {
                users: Some(Access::Write),
                ..LockPlan::default()
            },
            (EntityKind::User, Propagation::Immediate) => LockPlan {
                users: Some(Access::Write),
                locations: Some(Access::Read),
                visits: Some(Access::Write),
            },
            (EntityKind::Location, Propagation::Batched) => LockPlan {
                locations: Some(Access::Write),
                ..LockPlan::default()
            },
            (EntityKind::Location, Propagation::Immediate) => LockPlan {
                users: Some(Access::Read),
                locations: Some(Access::Write),
                visits: Some(Access::Write),
            },
        }
    }

    /// Integrity violations are logged as alerts and, under
    /// [`IntegrityPolicy::Abort`], end the process.
    fn escalate(&self, err: DbError) -> DbError {
        if let DbError::Integrity(message) = &err {
            error!(
                alert = "referential_integrity",
                policy = ?self.integrity,
                %message,
                "referential integrity violation"
            );
            if self.integrity == IntegrityPolicy::Abort {
                std::process::abort();
            }
        }
        err
    }
}
