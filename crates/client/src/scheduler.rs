//! Recurring refresh timer.
//!
//! A single task owns the [`Refresher`], so refresh cycles never overlap.
//! The first cycle runs immediately; each following one waits for the delay
//! to the next release checkpoint, computed from the clock after the previous
//! cycle finished, whatever its outcome.

use std::future::Future;
use std::sync::Arc;

use geofresh_core::{Clock, ReleaseSchedule};
use tokio::sync::Notify;

use crate::refresher::Refresher;

/// Requests out-of-band refresh cycles from outside the scheduler task.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    wake: Arc<Notify>,
}

impl SchedulerHandle {
    /// Ask for a refresh as soon as the current cycle (if any) finishes.
    ///
    /// Requests made before the scheduler gets to them collapse into one.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }
}

/// Drives the refresher on the release calendar.
pub struct Scheduler {
    refresher: Refresher,
    schedule: ReleaseSchedule,
    clock: Arc<dyn Clock>,
    wake: Arc<Notify>,
}

impl Scheduler {
    pub fn new(refresher: Refresher, schedule: ReleaseSchedule, clock: Arc<dyn Clock>) -> Self {
        Self { refresher, schedule, clock, wake: Arc::new(Notify::new()) }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle { wake: Arc::clone(&self.wake) }
    }

    /// Run until `shutdown` resolves, then hand the refresher back.
    ///
    /// Shutdown cancels the pending timer and abandons an in-flight cycle;
    /// the installed artifact stays valid.
    pub async fn run<F>(mut self, shutdown: F) -> Refresher
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let stopped = tokio::select! {
                _ = self.refresher.run_cycle() => false,
                _ = &mut shutdown => true,
            };
            if stopped {
                self.refresher.service().finish_refresh();
                tracing::info!("shutdown during refresh, abandoning download");
                break;
            }

            let now = self.clock.now();
            let delay = self.schedule.next_delay(now);
            tracing::info!(
                delay_secs = delay.as_secs(),
                weekday = %self.schedule.weekday(),
                "next database check scheduled"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.wake.notified() => tracing::info!("database refresh requested"),
                _ = &mut shutdown => {
                    tracing::info!("shutdown, cancelling refresh timer");
                    break;
                }
            }
        }

        self.refresher
    }
}
