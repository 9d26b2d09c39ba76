//! Accumulation path shared by the facade and the transport.
//!
//! [`InboundSink::deliver`] is the data-available notification: append,
//! evaluate the oracle on the full buffer, then either release everyone
//! (complete) or restart the quiet-period timer (incomplete). The three
//! steps run under an ingest lock so two deliveries never interleave.

use std::io;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;

use super::accumulator::ReceiveBuffer;
use super::debounce::DebounceScheduler;
use super::oracle::{OracleSlot, Verdict};
use super::waiters::{ReleaseReason, WaiterRegistry};
use crate::diagnostics::Diagnostics;

/// Diagnostic line deferred until the ingest lock is gone.
enum Note {
    Debug(String),
    Warn(String),
}

/// Engine state shared between the facade and the inbound sink.
#[derive(Debug)]
pub(crate) struct SyncCore {
    pub(crate) buffer: ReceiveBuffer,
    pub(crate) oracle: OracleSlot,
    pub(crate) waiters: Arc<WaiterRegistry>,
    pub(crate) debounce: DebounceScheduler,
    pub(crate) diagnostics: Diagnostics,
    ingest: Mutex<()>,
}

impl SyncCore {
    pub(crate) fn new(
        buffer: ReceiveBuffer,
        oracle: OracleSlot,
        waiters: Arc<WaiterRegistry>,
        debounce: DebounceScheduler,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            buffer,
            oracle,
            waiters,
            debounce,
            diagnostics,
            ingest: Mutex::new(()),
        }
    }

    /// Append and decide whether to release.
    ///
    /// Diagnostics are emitted after the ingest lock is released so the
    /// callback may read engine state.
    pub(crate) fn accumulate(&self, data: &[u8]) -> Verdict {
        let ingest = self.ingest.lock();

        let snapshot = self.buffer.append(data);
        tracing::trace!(
            "Accumulated {} bytes ({} buffered)",
            data.len(),
            snapshot.len()
        );

        let verdict = self.oracle.evaluate(&snapshot);
        let note = match &verdict {
            Verdict::Complete => {
                self.debounce.cancel();
                let released = self.waiters.release_all(ReleaseReason::FrameComplete);
                Some(Note::Debug(format!(
                    "Frame complete ({} bytes), released {} waiter(s)",
                    snapshot.len(),
                    released
                )))
            }
            Verdict::Incomplete => {
                self.debounce.restart();
                None
            }
            Verdict::Failed(reason) => {
                self.debounce.restart();
                Some(Note::Warn(format!(
                    "Completeness oracle failed, treating buffer as incomplete: {}",
                    reason
                )))
            }
        };
        drop(ingest);

        match note {
            Some(Note::Debug(msg)) => self.diagnostics.debug(&msg),
            Some(Note::Warn(msg)) => self.diagnostics.warn(&msg),
            None => {}
        }
        verdict
    }

    /// First two teardown steps: stop the timer, then force-release waiters.
    pub(crate) fn shutdown(&self) -> usize {
        self.debounce.stop();
        let released = self.waiters.close();
        if released > 0 {
            self.diagnostics
                .debug(&format!("Shutdown released {} waiter(s)", released));
        }
        released
    }
}

/// Cloneable handle a transport uses to hand arriving bytes to the engine.
///
/// Holds only a weak reference; once the engine is dropped deliveries are
/// refused.
#[derive(Debug, Clone)]
pub struct InboundSink {
    core: Weak<SyncCore>,
}

impl InboundSink {
    pub(crate) fn new(core: &Arc<SyncCore>) -> Self {
        Self {
            core: Arc::downgrade(core),
        }
    }

    /// Deliver newly arrived bytes.
    ///
    /// Returns `false` if the engine no longer exists.
    pub fn deliver(&self, data: &[u8]) -> bool {
        match self.core.upgrade() {
            Some(core) => {
                core.accumulate(data);
                true
            }
            None => false,
        }
    }

    /// Notification-style delivery: `count` bytes are readable, pull them
    /// with `read_available` and deliver whatever it returns.
    ///
    /// Returns the number of bytes delivered.
    pub fn data_available<F>(&self, count: usize, read_available: F) -> io::Result<usize>
    where
        F: FnOnce(usize) -> io::Result<Bytes>,
    {
        if count == 0 {
            return Ok(0);
        }
        let data = read_available(count)?;
        if self.deliver(&data) {
            Ok(data.len())
        } else {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "frame sync engine dropped",
            ))
        }
    }

    /// Report a transport-side event (link lost, read failure) through the
    /// engine's diagnostics.
    ///
    /// Returns `false` if the engine no longer exists.
    pub fn report(&self, message: &str) -> bool {
        match self.core.upgrade() {
            Some(core) => {
                core.diagnostics.warn(message);
                true
            }
            None => false,
        }
    }

    /// Whether the engine is still alive.
    pub fn is_connected(&self) -> bool {
        self.core.strong_count() > 0
    }
}
