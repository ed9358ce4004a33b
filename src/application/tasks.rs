//! Background maintenance loops.
//!
//! Three independent tokio tasks share the seen store for the lifetime of a
//! limiter: periodic snapshots, scrubbing of stale entries, and publication of
//! the store size gauge. All of them stop when the shared cancellation token
//! fires; only the snapshot loop does a final write on the way out.

use crate::application::metrics::{Gauge, MetricLabels};
use crate::application::persistence::PersistenceManager;
use crate::application::ports::MetricsSink;
use crate::application::seen_store::SeenStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Error returned when a background task did not stop cleanly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShutdownError {
    /// The task panicked
    #[error("background task {task} panicked")]
    TaskPanicked {
        /// Name of the task
        task: &'static str,
    },
    /// The task was aborted by the runtime
    #[error("background task {task} was cancelled by the runtime")]
    TaskAborted {
        /// Name of the task
        task: &'static str,
    },
}

/// Handle to the background tasks of a running limiter.
///
/// Dropping the handle does not stop the tasks; cancel the token passed to
/// `start` or call [`LimiterHandle::shutdown`].
#[derive(Debug)]
pub struct LimiterHandle {
    token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl LimiterHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self {
            token,
            tasks: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, name: &'static str, task: JoinHandle<()>) {
        self.tasks.push((name, task));
    }

    /// The token observed by every task.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Names of the running tasks, in spawn order.
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// True once every task has exited.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|(_, task)| task.is_finished())
    }

    /// Cancel the tasks and wait for them to exit, including the final
    /// snapshot.
    ///
    /// # Errors
    /// Reports the first task that panicked or was aborted. All tasks are
    /// awaited regardless.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        self.token.cancel();
        self.join().await
    }

    /// Wait for the tasks to exit without cancelling them.
    ///
    /// # Errors
    /// Same as [`LimiterHandle::shutdown`].
    pub async fn join(self) -> Result<(), ShutdownError> {
        let mut first_error = None;

        for (task, handle) in self.tasks {
            if let Err(join_error) = handle.await {
                error!(task, error = %join_error, "limiter task did not exit cleanly");
                let err = if join_error.is_panic() {
                    ShutdownError::TaskPanicked { task }
                } else {
                    ShutdownError::TaskAborted { task }
                };
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

// First tick one period from now, like a plain ticker.
fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Spawn the periodic snapshot loop.
pub(crate) fn spawn_snapshots(
    persistence: PersistenceManager,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => write_snapshot(&persistence).await,
                _ = token.cancelled() => {
                    info!("saving last seen state on exit");
                    write_snapshot(&persistence).await;
                    return;
                }
            }
        }
    })
}

async fn write_snapshot(persistence: &PersistenceManager) {
    let persistence = persistence.clone();
    match tokio::task::spawn_blocking(move || persistence.snapshot()).await {
        Ok(Ok(_)) => {}
        Ok(Err(error)) => error!(%error, "could not write last seen data to cache"),
        Err(error) => error!(%error, "snapshot task failed"),
    }
}

/// Spawn the periodic scrubber.
pub(crate) fn spawn_scrubber(
    store: SeenStore,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = store.scrub();
                    if removed > 0 {
                        debug!(removed, remaining = store.len(), "scrubbed stale last seen entries");
                    }
                }
                _ = token.cancelled() => return,
            }
        }
    })
}

/// Spawn the periodic store size reporter.
pub(crate) fn spawn_reporter(
    store: SeenStore,
    sink: Arc<dyn MetricsSink>,
    labels: MetricLabels,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sink.set_gauge(Gauge::Seen, &labels, store.len() as f64);
                }
                _ = token.cancelled() => return,
            }
        }
    })
}
