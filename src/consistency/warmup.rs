use super::activity::now_ms;
use super::coordinator::WriteCoordinator;
use crate::config::Propagation;
use crate::core::Result;
use crate::model::{VISITED_AT, VISITS};
use crate::storage::Query;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupSettings {
    /// How often the scheduler wakes up.
    pub period: Duration,
    /// Write inactivity required before a pass runs.
    pub quiescence: Duration,
}

impl Default for WarmupSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(500),
            quiescence: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupReport {
    /// Visits rewritten by the reconciliation pass.
    pub reconciled: usize,
    /// Rows returned by the priming query.
    pub primed: usize,
    /// False when a write landed during the pass, which keeps the next pass
    /// scheduled.
    pub reset: bool,
}

/// Background task that reconciles deferred shadow-field updates and primes
/// the visit sort path once writes have gone quiet.
pub struct WarmupScheduler {
    coordinator: Arc<WriteCoordinator>,
    settings: WarmupSettings,
}

impl WarmupScheduler {
    pub fn new(coordinator: Arc<WriteCoordinator>, settings: WarmupSettings) -> Self {
        Self {
            coordinator,
            settings,
        }
    }

    /// Runs one check at wall-clock time `now_ms`. Returns `None` when idle
    /// or still inside the quiescence window.
    pub async fn tick(&self, now_ms: u64) -> Result<Option<WarmupReport>> {
        let activity = self.coordinator.activity();
        let Some(observed) = activity.last_write() else {
            return Ok(None);
        };
        let quiet_for = now_ms.saturating_sub(observed);
        if u128::from(quiet_for) <= self.settings.quiescence.as_millis() {
            return Ok(None);
        }
        self.run_pass(observed).await.map(Some)
    }

    /// Reconciles, primes and returns to idle unless the last write is no
    /// longer `observed`.
    pub async fn run_pass(&self, observed: u64) -> Result<WarmupReport> {
        let activity = self.coordinator.activity();
        let reconciled = match self.coordinator.propagation() {
            Propagation::Batched => self.coordinator.reconcile_pending().await?,
            Propagation::Immediate => 0,
        };

        info!("Start warming up");
        let primed = self
            .coordinator
            .store()
            .select(&Query::new(VISITS).sort(VISITED_AT, false).limit(1))
            .await?
            .len();
        info!("Finish warming up");

        let reset = activity.reset_idle_if(observed);
        Ok(WarmupReport {
            reconciled,
            primed,
            reset,
        })
    }

    /// Starts the loop. It stops when `shutdown` flips to `true` or its
    /// sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                period = ?self.settings.period,
                quiescence = ?self.settings.quiescence,
                "warmup scheduler started"
            );
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.period) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                match self.tick(now_ms()).await {
                    Ok(Some(report)) => info!(
                        reconciled = report.reconciled,
                        primed = report.primed,
                        reset = report.reset,
                        "warmup pass complete"
                    ),
                    Ok(None) => {}
                    Err(err) => error!(error = %err, "warmup pass failed"),
                }
            }
            info!("warmup scheduler stopped");
        })
    }
}
