use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Which guard to take on each collection. `None` leaves it unguarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockPlan {
    pub users: Option<Access>,
    pub locations: Option<Access>,
    pub visits: Option<Access>,
}

enum Guard<'a> {
    Read(RwLockReadGuard<'a, ()>),
    Write(RwLockWriteGuard<'a, ()>),
}

/// Held guards; released together on drop.
pub struct LockSet<'a> {
    _guards: Vec<Guard<'a>>,
}

/// One reader-writer guard per collection.
///
/// Guards are always taken in the order users, locations, visits, so two
/// plans can never wait on each other in a cycle.
#[derive(Debug, Default)]
pub struct CollectionLocks {
    users: RwLock<()>,
    locations: RwLock<()>,
    visits: RwLock<()>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, plan: LockPlan) -> LockSet<'_> {
        let mut guards = Vec::with_capacity(3);
        for (lock, access) in [
            (&self.users, plan.users),
            (&self.locations, plan.locations),
            (&self.visits, plan.visits),
        ] {
            match access {
                Some(Access::Read) => guards.push(Guard::Read(lock.read().await)),
                Some(Access::Write) => guards.push(Guard::Write(lock.write().await)),
                None => {}
            }
        }
        LockSet { _guards: guards }
    }
}
