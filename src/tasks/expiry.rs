//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::{Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Keys inspected
    pub scanned: usize,
    /// Expired entries removed
    pub expired: usize,
    /// Keys whose removal failed
    pub failed: usize,
}

/// Something the scheduler can sweep.
///
/// Failures are handled inside `sweep` and only reported through the
/// returned [`SweepReport`], so one bad key never stops the loop.
#[async_trait]
pub trait SweepTarget: Send + Sync + 'static {
    async fn sweep(&self) -> SweepReport;
}

// == Expiry Scheduler ==
/// Handle to the periodic sweep task.
///
/// Sweeps run inline in the task loop, so at most one is active at a time;
/// ticks that come due while a sweep is still running are skipped.
#[derive(Debug)]
pub struct ExpiryScheduler {
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExpiryScheduler {
    /// Spawns a task sweeping `target` every `interval`, first tick one
    /// interval from now.
    ///
    /// The task holds only a weak reference and exits once `target` is dropped.
    pub fn spawn(target: Weak<dyn SweepTarget>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_sweeps(target, interval, token.clone()));

        Self {
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancels future ticks and waits for an in-flight sweep to finish.
    ///
    /// Safe to call more than once.
    pub async fn stop(&self) {
        self.token.cancel();

        let handle = self.handle.lock().ok().and_then(|mut handle| handle.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Expiry scheduler task failed");
            }
        }
    }

    /// Returns true while the task is still looping.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|handle| handle.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

async fn run_sweeps(target: Weak<dyn SweepTarget>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Starting expiry sweep with interval of {} ms",
        interval.as_millis()
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(target) = target.upgrade() else {
            debug!("Cache dropped, ending expiry sweep");
            break;
        };

        // Not raced against cancellation: a started sweep always completes
        let report = target.sweep().await;
        drop(target);

        if report.expired > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                expired = report.expired,
                failed = report.failed,
                "Expiry sweep removed expired entries"
            );
        } else {
            debug!(scanned = report.scanned, "Expiry sweep: no expired entries found");
        }
    }

    info!("Expiry sweep stopped");
}
