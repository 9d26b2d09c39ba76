//! Waiter registry.
//!
//! Every caller blocked on the next release event holds a [`WaitHandle`]
//! backed by a oneshot channel. [`WaiterRegistry::release_all`] drains the
//! whole queue under one lock and fires each sender once; a sender is
//! consumed by sending, so a handle can never be signaled twice.
//!
//! A caller whose own timeout elapses simply drops its handle. The stale
//! sender is pruned on the next enqueue or release.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Why a waiter was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseReason {
    /// The completeness oracle accepted the buffer.
    FrameComplete,
    /// No bytes arrived for the configured quiet period.
    QuietPeriod,
    /// The engine is shutting down.
    Shutdown,
}

/// Result of waiting on a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Signaled by a release event.
    Released(ReleaseReason),
    /// The caller's own timeout elapsed first.
    TimedOut,
}

impl WaitOutcome {
    /// Whether the handle was signaled before the timeout.
    #[inline]
    pub fn is_signaled(&self) -> bool {
        matches!(self, WaitOutcome::Released(_))
    }
}

/// Per-call token for one blocked waiter.
#[derive(Debug)]
pub struct WaitHandle {
    id: u64,
    rx: oneshot::Receiver<ReleaseReason>,
}

impl WaitHandle {
    /// Registry-assigned id, unique per registry.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Suspend until released or until `timeout` elapses.
    ///
    /// A handle that was already signaled returns immediately, even with a
    /// zero timeout.
    pub async fn wait(self, timeout: Duration) -> WaitOutcome {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(reason)) => WaitOutcome::Released(reason),
            // Sender dropped without a signal: the registry is gone.
            Ok(Err(_)) => WaitOutcome::Released(ReleaseReason::Shutdown),
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}

#[derive(Debug)]
struct State {
    queue: VecDeque<(u64, oneshot::Sender<ReleaseReason>)>,
    next_id: u64,
    closed: bool,
}

/// Queue of waiters released all at once.
#[derive(Debug)]
pub struct WaiterRegistry {
    state: Mutex<State>,
}

impl WaiterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                next_id: 1,
                closed: false,
            }),
        }
    }

    /// Register a new waiter.
    ///
    /// After [`close`](Self::close) the returned handle is already signaled
    /// with [`ReleaseReason::Shutdown`].
    pub fn enqueue(&self) -> WaitHandle {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();

        let id = state.next_id;
        state.next_id += 1;

        if state.closed {
            let _ = tx.send(ReleaseReason::Shutdown);
        } else {
            state.queue.retain(|(_, tx)| !tx.is_closed());
            state.queue.push_back((id, tx));
        }

        WaitHandle { id, rx }
    }

    /// Signal every currently enqueued waiter exactly once.
    ///
    /// Returns the number of waiters that were still listening.
    pub fn release_all(&self, reason: ReleaseReason) -> usize {
        let drained = std::mem::take(&mut self.state.lock().queue);

        drained
            .into_iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(_, tx)| tx.send(reason))
            .filter(|sent| sent.is_ok())
            .count()
    }

    /// Release everyone with [`ReleaseReason::Shutdown`] and refuse to park
    /// new waiters from now on.
    pub fn close(&self) -> usize {
        self.state.lock().closed = true;
        self.release_all(ReleaseReason::Shutdown)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of waiters still listening.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .queue
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }
}

impl Default for WaiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
