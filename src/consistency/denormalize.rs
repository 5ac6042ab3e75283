use super::activity::PendingUpdates;
use crate::core::{DbError, Record, Result};
use crate::model::{
    self, EntityKind, LOCATION_SHADOW_FIELDS, USER_SHADOW_FIELDS, LOCATIONS, USERS, VISITS,
};
use crate::storage::{Cond, EntityStore, Query};
use std::sync::Arc;
use tracing::{debug, info};

/// Recomputes the shadow fields a visit copies from its user and location.
///
/// The engine itself takes no guards. Callers hold read guards on `users`
/// and `locations` plus the write guard on `visits` (see
/// [`WriteCoordinator`](super::WriteCoordinator)), which makes each
/// lookup-and-rewrite atomic with respect to coordinated writes.
#[derive(Clone)]
pub struct Denormalizer {
    store: Arc<dyn EntityStore>,
}

impl Denormalizer {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Overwrites the shadow fields of `visit` with the current values of its
    /// referenced user and location.
    ///
    /// Both references must resolve to exactly one record; anything else is a
    /// [`DbError::Integrity`].
    pub async fn denormalize(&self, visit: &mut Record) -> Result<()> {
        let user_id = visit.get_i64(model::USER)?;
        let location_id = visit.get_i64(model::LOCATION)?;

        let user = self.lookup_single(USERS, user_id, visit).await?;
        let location = self.lookup_single(LOCATIONS, location_id, visit).await?;

        for name in LOCATION_SHADOW_FIELDS {
            visit.set(name, location.get(name)?.clone())?;
        }
        for name in USER_SHADOW_FIELDS {
            visit.set(name, user.get(name)?.clone())?;
        }
        Ok(())
    }

    /// Re-denormalizes one stored visit and writes it back.
    pub async fn denormalize_by_id(&self, visit_id: i64) -> Result<()> {
        let results = self
            .store
            .select(&Query::new(VISITS).filter(model::ID, Cond::Eq, visit_id))
            .await?;
        let item = results
            .single()
            .ok_or_else(|| DbError::not_found(format!("visit {}", visit_id)))?;
        self.refresh(&item.record).await
    }

    /// Immediate propagation: refreshes every visit that references the given
    /// user or location. Returns how many visits were rewritten.
    pub async fn cascade(&self, kind: EntityKind, id: i64) -> Result<usize> {
        let foreign_key = match kind {
            EntityKind::User => model::USER,
            EntityKind::Location => model::LOCATION,
            EntityKind::Visit => return Ok(0),
        };

        let query = Query::new(VISITS).filter(foreign_key, Cond::Eq, id);
        let results = self.store.select(&query).await?;
        for record in results.records() {
            self.refresh(record).await?;
        }

        debug!(%kind, id, visits = results.len(), "cascaded shadow fields");
        Ok(results.len())
    }

    /// Batched propagation: refreshes every visit whose id, user or location
    /// appears in `pending`. Returns how many visits were rewritten.
    pub async fn reconcile(&self, pending: &PendingUpdates) -> Result<usize> {
        if pending.is_empty() {
            return Ok(0);
        }

        let query = Query::new(VISITS)
            .filter_set(model::ID, pending.visits.iter().copied())
            .or()
            .filter_set(model::USER, pending.users.iter().copied())
            .or()
            .filter_set(model::LOCATION, pending.locations.iter().copied());

        info!(
            visits = pending.visits.len(),
            users = pending.users.len(),
            locations = pending.locations.len(),
            "Updating visits"
        );
        let results = self.store.select(&query).await?;
        info!(count = results.len(), "Got visits for update");

        for record in results.records() {
            self.refresh(record).await?;
        }

        info!("Done update visits");
        Ok(results.len())
    }

    async fn refresh(&self, stored: &Arc<Record>) -> Result<()> {
        let mut visit = Record::clone(stored);
        self.denormalize(&mut visit).await?;
        self.store.upsert(visit).await?;
        Ok(())
    }

    async fn lookup_single(&self, collection: &str, id: i64, visit: &Record) -> Result<Arc<Record>> {
        let results = self
            .store
            .select(&Query::new(collection).filter(model::ID, Cond::Eq, id))
            .await?;

        match results.single() {
            Some(item) => Ok(Arc::clone(&item.record)),
            None => Err(DbError::integrity(format!(
                "visit {} references {} {} which resolves to {} records",
                visit.id().unwrap_or_default(),
                collection,
                id,
                results.len()
            ))),
        }
    }
}
