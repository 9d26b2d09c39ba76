//! Debounce (quiet-period) scheduler.
//!
//! At most one timer is armed at a time. Each timer is tagged with a
//! [`DebounceEpoch`]; restarting bumps the epoch, aborts the previous task
//! and spawns a fresh one, so the clock restarts rather than extends.
//!
//! The expiry path re-checks, under the scheduler lock, that its epoch is
//! still the armed one before releasing waiters. A superseded or cancelled
//! timer that wakes up anyway sees a different epoch and does nothing, and
//! because restart and cancel take the same lock, no later epoch's waiters
//! can be released by a stale timer.
//!
//! ```text
//! append ─► restart() ─► epoch N armed ──(quiet period)──► expire(N) ─► release_all
//!              │
//! append ─► restart() ─► epoch N+1 armed   (N aborted; expire(N) is a no-op)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::waiters::{ReleaseReason, WaiterRegistry};
use crate::diagnostics::Diagnostics;
use crate::error::{FrameSyncError, Result};

/// Generation token for one quiet-period timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DebounceEpoch(u64);

impl DebounceEpoch {
    /// Raw generation number. Epoch 0 means no timer was ever started.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DebounceEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "epoch#{}", self.0)
    }
}

struct Armed {
    epoch: DebounceEpoch,
    task: JoinHandle<()>,
}

struct Slot {
    /// Last epoch handed out.
    latest: u64,
    armed: Option<Armed>,
    stopped: bool,
}

struct Shared {
    slot: Mutex<Slot>,
    waiters: Arc<WaiterRegistry>,
    diagnostics: Diagnostics,
    fired: AtomicU64,
}

impl Shared {
    /// Timer callback. Returns whether this epoch actually released.
    fn expire(&self, epoch: DebounceEpoch) -> bool {
        let mut slot = self.slot.lock();

        match &slot.armed {
            Some(armed) if armed.epoch == epoch => {}
            _ => {
                tracing::trace!("Stale debounce {} expired, ignoring", epoch);
                return false;
            }
        }

        slot.armed = None;
        self.fired.fetch_add(1, Ordering::AcqRel);

        // Released while still holding the slot so no newer epoch can start
        // in between.
        let released = self.waiters.release_all(ReleaseReason::QuietPeriod);
        drop(slot);

        self.diagnostics.debug(&format!(
            "Quiet period elapsed ({}), released {} waiter(s)",
            epoch, released
        ));
        true
    }
}

/// Quiet-period timer that releases all waiters on uninterrupted expiry.
pub struct DebounceScheduler {
    quiet: Duration,
    runtime: Handle,
    shared: Arc<Shared>,
}

impl DebounceScheduler {
    /// Create a scheduler on the current tokio runtime.
    ///
    /// Fails with [`FrameSyncError::NoRuntime`] outside a runtime.
    pub fn new(
        quiet: Duration,
        waiters: Arc<WaiterRegistry>,
        diagnostics: Diagnostics,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| FrameSyncError::NoRuntime)?;
        Ok(Self::with_handle(quiet, waiters, diagnostics, runtime))
    }

    /// Create a scheduler that spawns its timers on `runtime`.
    pub fn with_handle(
        quiet: Duration,
        waiters: Arc<WaiterRegistry>,
        diagnostics: Diagnostics,
        runtime: Handle,
    ) -> Self {
        Self {
            quiet,
            runtime,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    latest: 0,
                    armed: None,
                    stopped: false,
                }),
                waiters,
                diagnostics,
                fired: AtomicU64::new(0),
            }),
        }
    }

    /// Configured quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Start a new epoch, superseding the armed one if any.
    ///
    /// Returns `None` once the scheduler has been stopped.
    pub fn restart(&self) -> Option<DebounceEpoch> {
        let mut slot = self.shared.slot.lock();
        if slot.stopped {
            return None;
        }

        slot.latest += 1;
        let epoch = DebounceEpoch(slot.latest);

        if let Some(previous) = slot.armed.take() {
            previous.task.abort();
            tracing::trace!("Debounce {} superseded by {}", previous.epoch, epoch);
        }

        let shared = self.shared.clone();
        let quiet = self.quiet;
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(quiet).await;
            shared.expire(epoch);
        });

        slot.armed = Some(Armed { epoch, task });
        Some(epoch)
    }

    /// Cancel the armed epoch without starting a new one.
    ///
    /// Returns the cancelled epoch, or `None` if nothing was armed.
    pub fn cancel(&self) -> Option<DebounceEpoch> {
        let armed = self.shared.slot.lock().armed.take()?;
        armed.task.abort();
        Some(armed.epoch)
    }

    /// Cancel the armed epoch and refuse further restarts.
    pub fn stop(&self) -> Option<DebounceEpoch> {
        let mut slot = self.shared.slot.lock();
        slot.stopped = true;
        let armed = slot.armed.take()?;
        armed.task.abort();
        Some(armed.epoch)
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.shared.slot.lock().stopped
    }

    /// Epoch of the armed timer, if any.
    pub fn armed_epoch(&self) -> Option<DebounceEpoch> {
        self.shared.slot.lock().armed.as_ref().map(|a| a.epoch)
    }

    /// Most recently started epoch, armed or not.
    pub fn latest_epoch(&self) -> DebounceEpoch {
        DebounceEpoch(self.shared.slot.lock().latest)
    }

    /// Number of epochs that expired and released waiters.
    pub fn fired_count(&self) -> u64 {
        self.shared.fired.load(Ordering::Acquire)
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DebounceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceScheduler")
            .field("quiet", &self.quiet)
            .field("armed", &self.armed_epoch())
            .field("fired", &self.fired_count())
            .finish()
    }
}
