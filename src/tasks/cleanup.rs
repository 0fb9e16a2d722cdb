//! Cleanup Scheduling
//!
//! Single-flight guard for cleanup passes plus the periodic and on-write
//! triggers that feed it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::{CacheError, Result};

/// Delay between a write crossing the eviction threshold and the cleanup
/// attempt it triggers.
pub const ONE_SHOT_DELAY: Duration = Duration::from_millis(50);

// == Outcome ==
/// Counts produced by a completed cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Entries removed by the normal-eviction test
    pub expired: usize,
    /// Entries removed for being over capacity
    pub evicted: usize,
    /// Entries left once the pass finished
    pub remaining: usize,
}

/// Result of a cleanup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// This caller ran the pass
    Completed(CleanupReport),
    /// Another pass held the run slot; nothing was done
    Skipped,
}

impl CleanupOutcome {
    pub fn report(&self) -> Option<&CleanupReport> {
        match self {
            CleanupOutcome::Completed(report) => Some(report),
            CleanupOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CleanupOutcome::Skipped)
    }
}

/// Something a background trigger can ask to clean itself up.
pub trait CleanupTarget: Send + Sync + 'static {
    /// Runs a pass if none is running, otherwise returns `Skipped` at once.
    fn attempt_cleanup(&self) -> CleanupOutcome;
}

// == Run Slot ==
/// Names the thread currently running a cleanup pass, if any.
#[derive(Debug, Default)]
pub struct RunSlot {
    runner: Mutex<Option<ThreadId>>,
}

impl RunSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for the calling thread without waiting.
    ///
    /// Returns `None` when another pass already holds it. The slot is freed
    /// when the returned guard drops, unwinding included.
    pub fn try_claim(&self) -> Option<RunGuard<'_>> {
        let mut runner = self.runner.lock();
        if runner.is_some() {
            return None;
        }
        *runner = Some(thread::current().id());
        Some(RunGuard { slot: self })
    }

    /// The thread holding the slot.
    pub fn runner(&self) -> Option<ThreadId> {
        *self.runner.lock()
    }

    pub fn is_running(&self) -> bool {
        self.runner().is_some()
    }
}

/// Proof of holding the [`RunSlot`].
#[derive(Debug)]
pub struct RunGuard<'a> {
    slot: &'a RunSlot,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.slot.runner.lock() = None;
    }
}

// == Scheduler ==
/// Per-cache trigger state: the run slot, the periodic task and the pending
/// one-shot flag.
#[derive(Debug)]
pub struct CleanupScheduler {
    slot: RunSlot,
    runtime: Option<Handle>,
    one_shot_pending: Arc<AtomicBool>,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupScheduler {
    /// Creates a scheduler that spawns its timers on `runtime`.
    ///
    /// Without a runtime only explicit cleanup attempts run.
    pub fn new(runtime: Option<Handle>) -> Self {
        Self {
            slot: RunSlot::new(),
            runtime,
            one_shot_pending: Arc::new(AtomicBool::new(false)),
            periodic: Mutex::new(None),
        }
    }

    pub fn slot(&self) -> &RunSlot {
        &self.slot
    }

    /// Starts the periodic sweep; a zero interval starts nothing.
    pub fn start_periodic<T: CleanupTarget>(
        &self,
        target: Weak<T>,
        cleanup_interval_secs: u64,
    ) -> Result<()> {
        if cleanup_interval_secs == 0 {
            return Ok(());
        }
        let runtime = self.runtime.as_ref().ok_or(CacheError::MissingRuntime)?;
        let handle = spawn_cleanup_task(runtime, target, cleanup_interval_secs);
        if let Some(previous) = self.periodic.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    pub fn has_periodic(&self) -> bool {
        self.periodic.lock().is_some()
    }

    /// Schedules one cleanup attempt after [`ONE_SHOT_DELAY`].
    ///
    /// Requests arriving while one is already pending are folded into it.
    pub fn request_one_shot<T: CleanupTarget>(&self, target: Weak<T>) {
        let Some(runtime) = self.runtime.as_ref() else {
            debug!("no tokio runtime; over-threshold cleanup deferred to an explicit attempt");
            return;
        };
        if self.one_shot_pending.swap(true, Ordering::AcqRel) {
            return;
        }

        let pending = Arc::clone(&self.one_shot_pending);
        runtime.spawn(async move {
            tokio::time::sleep(ONE_SHOT_DELAY).await;
            pending.store(false, Ordering::Release);
            run_detached(&target, "on-write").await;
        });
        debug!("scheduled on-write cleanup");
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.periodic.get_mut().take() {
            handle.abort();
        }
    }
}

/// Spawns a background task that periodically attempts a cleanup of `target`.
///
/// The first attempt happens one interval after the call. Each attempt runs
/// on the blocking pool; a pass that panics is logged and the loop carries
/// on. The task ends once `target` has been dropped.
///
/// `cleanup_interval_secs` must be non-zero.
pub fn spawn_cleanup_task<T: CleanupTarget>(
    runtime: &Handle,
    target: Weak<T>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs);

    runtime.spawn(async move {
        info!(
            "Starting cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !run_detached(&target, "periodic").await {
                debug!("cache dropped, stopping cleanup task");
                break;
            }
        }
    })
}

/// Runs one attempt on the blocking pool. Returns false if the target is gone.
async fn run_detached<T: CleanupTarget>(target: &Weak<T>, trigger: &'static str) -> bool {
    let Some(target) = target.upgrade() else {
        return false;
    };

    match tokio::task::spawn_blocking(move || target.attempt_cleanup()).await {
        Ok(CleanupOutcome::Completed(report)) => {
            if report.expired + report.evicted > 0 {
                info!(
                    trigger,
                    expired = report.expired,
                    evicted = report.evicted,
                    remaining = report.remaining,
                    "cleanup pass removed entries"
                );
            } else {
                debug!(trigger, remaining = report.remaining, "cleanup pass found nothing to remove");
            }
        }
        Ok(CleanupOutcome::Skipped) => {
            debug!(trigger, "cleanup already running, attempt skipped");
        }
        Err(err) => {
            error!(trigger, error = %err, "cleanup pass failed");
        }
    }
    true
}
