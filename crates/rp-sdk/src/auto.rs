//! Timer-driven automatic snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use rp_types::RestorePointKind;

use crate::restore_points::RestorePoints;
use crate::runtime::DocumentRuntime;
use crate::settings::SnapshotInterval;

/// Supplies the current project title at each tick.
pub type TitleSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Background task taking an automatic snapshot every interval.
///
/// A failed snapshot is logged and the next tick tries again. The task is
/// aborted by [`AutoSnapshot::stop`] or when the value is dropped.
#[derive(Debug)]
pub struct AutoSnapshot {
    task: JoinHandle<()>,
    attempts: Arc<AtomicU64>,
}

impl AutoSnapshot {
    /// Start the timer, or return `None` if `interval` is disabled.
    ///
    /// The first snapshot is taken one full interval after starting.
    pub fn start(
        points: RestorePoints,
        runtime: Arc<dyn DocumentRuntime>,
        title: TitleSource,
        every: SnapshotInterval,
    ) -> Option<Self> {
        let Some(period) = every.period() else {
            info!("automatic snapshots disabled");
            return None;
        };
        let attempts = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&attempts);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                counter.fetch_add(1, Ordering::SeqCst);
                let title = title();
                match points
                    .create_snapshot(runtime.as_ref(), &title, RestorePointKind::Automatic)
                    .await
                {
                    Ok(Some(id)) => debug!(%id, %title, "automatic snapshot taken"),
                    Ok(None) => debug!(%title, "automatic snapshot skipped; no storage"),
                    Err(e) => warn!(%title, error = %e, "automatic snapshot failed"),
                }
            }
        });

        info!(period_ms = period.as_millis() as u64, "automatic snapshots started");
        Some(Self { task, attempts })
    }

    /// Number of ticks that attempted a snapshot.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for AutoSnapshot {
    fn drop(&mut self) {
        self.task.abort();
    }
}
