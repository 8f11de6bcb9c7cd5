//! Recurring trigger for the refresh task.
//!
//! Runs the task once at startup and then on every tick. A single-flight
//! permit keeps at most one refresh (including its retries) in flight; a
//! tick that fires while one is still running is skipped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::RefreshTask;

pub const DEFAULT_JOB_NAME: &str = "session refresh";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Why a refresh was started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Tick,
}

#[derive(Debug)]
pub struct Scheduler {
    name: String,
    interval: Duration,
    task: RefreshTask,
    flight: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(task: RefreshTask, interval: Duration) -> Self {
        Self {
            name: DEFAULT_JOB_NAME.to_owned(),
            interval,
            task,
            flight: Arc::new(Semaphore::new(1)),
        }
    }

    /// True while a refresh holds the single-flight permit.
    pub fn is_busy(&self) -> bool {
        self.flight.available_permits() == 0
    }

    /// Spawns a refresh unless one is already running.
    pub fn trigger(&self, reason: Trigger) -> Option<JoinHandle<()>> {
        let Ok(permit) = Arc::clone(&self.flight).try_acquire_owned() else {
            warn!(job = %self.name, ?reason, "previous refresh still in flight, skipping");
            return None;
        };

        let task = self.task.clone();
        let name = self.name.clone();
        Some(tokio::spawn(async move {
            let _permit = permit;
            match task.run().await {
                Ok(outcome) => info!(
                    job = %name,
                    ?reason,
                    attempts = outcome.attempts,
                    status = outcome.status,
                    "refresh finished"
                ),
                Err(err) => error!(job = %name, ?reason, error = %err, "refresh abandoned"),
            }
        }))
    }

    /// Runs until `shutdown` resolves, then cancels any refresh in flight.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; it stands in for the startup run.
        ticker.tick().await;

        info!(
            job = %self.name,
            interval_secs = self.interval.as_secs(),
            url = %self.task.url(),
            "scheduler started"
        );
        let mut in_flight = self.trigger(Trigger::Startup);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Some(handle) = self.trigger(Trigger::Tick) {
                        in_flight = Some(handle);
                    }
                }
            }
        }

        if let Some(handle) = in_flight {
            handle.abort();
            let _ = handle.await;
        }
        info!(job = %self.name, "scheduler stopped");
    }
}
