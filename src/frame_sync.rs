//! Synchronization facade and builder.
//!
//! The [`FrameSyncBuilder`] configures the quiet period, buffer limits, the
//! completeness oracle and the diagnostic callback. The [`FrameSync`] engine
//! then exposes the request/response surface over the transport:
//! 1. `open` the transport (arriving bytes start accumulating)
//! 2. `send` a request
//! 3. `receive` / `peek` / `read_and_clear` wait for the next frame boundary
//! 4. `shutdown` tears everything down in order
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use framesync::{FrameSync, StreamTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (port, _device) = tokio::io::duplex(1024);
//!
//!     let sync = FrameSync::builder()
//!         .msg_wait_ms(35)
//!         .oracle(|data: &[u8]| data.len() >= 5 && data[0] == 0xAA && data[data.len() - 1] == 0xFF)
//!         .build(StreamTransport::from_stream(port))?;
//!
//!     sync.open().await;
//!     let reply = sync
//!         .send_and_wait_result(&[0x01, 0x03], Duration::from_millis(500), false)
//!         .await;
//!     println!("{:02X?}", &reply[..]);
//!
//!     sync.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{FrameSyncError, Result};
use crate::sync::{
    CompletenessOracle, DebounceEpoch, DebounceScheduler, InboundSink, OracleSlot,
    ReceiveBuffer, SyncCore, WaitHandle, WaitOutcome, WaiterRegistry,
};
use crate::transport::Transport;

/// Builder for configuring and creating a [`FrameSync`] engine.
pub struct FrameSyncBuilder {
    config: SyncConfig,
    oracle: Option<Arc<dyn CompletenessOracle>>,
    oracle_registrations: usize,
    diagnostics: Diagnostics,
}

impl FrameSyncBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
            oracle: None,
            oracle_registrations: 0,
            diagnostics: Diagnostics::none(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the quiet period in milliseconds.
    ///
    /// Default: 35
    pub fn msg_wait_ms(mut self, ms: i64) -> Self {
        self.config.msg_wait_ms = ms;
        self
    }

    /// Set the quiet period.
    pub fn msg_wait_time(mut self, quiet: Duration) -> Self {
        self.config.msg_wait_ms = i64::try_from(quiet.as_millis()).unwrap_or(i64::MAX);
        self
    }

    /// Set the maximum number of retained bytes.
    ///
    /// Default: 64 KiB
    pub fn max_buffer_len(mut self, len: usize) -> Self {
        self.config.max_buffer_len = len;
        self
    }

    /// Set the initial buffer allocation.
    ///
    /// Default: 4 KiB
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Register the completeness oracle.
    ///
    /// Only one oracle per engine; registering a second one makes
    /// [`build`](Self::build) fail.
    pub fn oracle<O>(mut self, oracle: O) -> Self
    where
        O: CompletenessOracle,
    {
        self.oracle_registrations += 1;
        self.oracle = Some(Arc::new(oracle));
        self
    }

    /// Register a diagnostic callback.
    pub fn diagnostics<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.diagnostics = Diagnostics::new(callback);
        self
    }

    /// Validate the configuration and build the engine around `transport`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build<T: Transport>(self, transport: T) -> Result<FrameSync> {
        self.config.validate()?;
        if self.oracle_registrations > 1 {
            return Err(FrameSyncError::InvalidConfig(format!(
                "only one completeness oracle may be registered (got {})",
                self.oracle_registrations
            )));
        }

        let oracle = match self.oracle {
            Some(oracle) => OracleSlot::new(oracle),
            None => OracleSlot::empty(),
        };
        let waiters = Arc::new(WaiterRegistry::new());
        let debounce = DebounceScheduler::new(
            self.config.msg_wait_time(),
            waiters.clone(),
            self.diagnostics.clone(),
        )?;
        let buffer = ReceiveBuffer::with_limits(
            self.config.effective_capacity(),
            self.config.max_buffer_len,
        );

        tracing::debug!(
            "Frame sync built: quiet period {}ms, buffer cap {} bytes, oracle {}",
            self.config.msg_wait_ms,
            self.config.max_buffer_len,
            if oracle.is_registered() { "registered" } else { "none" }
        );

        Ok(FrameSync {
            core: Arc::new(SyncCore::new(
                buffer,
                oracle,
                waiters,
                debounce,
                self.diagnostics,
            )),
            transport: Mutex::new(Box::new(transport)),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Default for FrameSyncBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-boundary synchronization engine over a transport.
pub struct FrameSync {
    /// Accumulator, oracle, timer and waiters.
    core: Arc<SyncCore>,
    /// Open/close/write path, serialized separately from the buffer.
    transport: Mutex<Box<dyn Transport>>,
    /// Set once `shutdown` ran.
    shut_down: AtomicBool,
}

impl FrameSync {
    /// Create a new engine builder.
    pub fn builder() -> FrameSyncBuilder {
        FrameSyncBuilder::new()
    }

    /// Handle for delivering bytes into this engine.
    ///
    /// Transports receive one on `open`; externally driven transports and
    /// tests can grab one here.
    pub fn inbound(&self) -> InboundSink {
        InboundSink::new(&self.core)
    }

    /// Open the transport. Returns `false` instead of propagating errors.
    ///
    /// Always `false` after [`shutdown`](Self::shutdown).
    pub async fn open(&self) -> bool {
        let mut transport = self.transport.lock().await;
        if self.is_shut_down() {
            tracing::debug!("Engine shut down, refusing to open transport");
            return false;
        }
        if transport.is_open() {
            return true;
        }

        match transport.open(self.inbound()).await {
            Ok(()) => {
                self.core.diagnostics.debug("Transport opened");
                true
            }
            Err(e) => {
                self.core
                    .diagnostics
                    .warn(&format!("Failed to open transport: {}", e));
                false
            }
        }
    }

    /// Close the transport. Returns `false` instead of propagating errors.
    pub async fn close(&self) -> bool {
        let mut transport = self.transport.lock().await;
        if !transport.is_open() {
            return true;
        }

        match transport.close().await {
            Ok(()) => {
                self.core.diagnostics.debug("Transport closed");
                true
            }
            Err(e) => {
                self.core
                    .diagnostics
                    .warn(&format!("Failed to close transport: {}", e));
                false
            }
        }
    }

    /// Whether the transport is open.
    pub async fn is_open(&self) -> bool {
        self.transport.lock().await.is_open()
    }

    /// Write to the transport. Silently skipped while closed.
    pub async fn send(&self, data: &[u8]) {
        match self.try_send(data).await {
            Ok(()) => {}
            Err(FrameSyncError::NotOpen) => {
                tracing::trace!("Transport closed, dropping {} outbound bytes", data.len());
            }
            Err(e) => {
                self.core
                    .diagnostics
                    .warn(&format!("Failed to write {} bytes: {}", data.len(), e));
            }
        }
    }

    /// Write to the transport, reporting why nothing was sent.
    ///
    /// Fails with [`FrameSyncError::NotOpen`] while closed and
    /// [`FrameSyncError::Io`] when the write itself fails.
    pub async fn try_send(&self, data: &[u8]) -> Result<()> {
        let mut transport = self.transport.lock().await;
        if !transport.is_open() {
            return Err(FrameSyncError::NotOpen);
        }
        transport.write(data).await?;
        Ok(())
    }

    /// Wait for the next frame boundary and return the buffered bytes.
    ///
    /// If bytes are already buffered they are returned at once. Otherwise
    /// the call waits up to `wait` for a release event and returns whatever
    /// is buffered then, possibly nothing. The buffer is cleared unless
    /// `only_read` is set.
    pub async fn receive(&self, wait: Duration, only_read: bool) -> Bytes {
        let core = &self.core;

        if !core.buffer.is_empty() || wait.is_zero() {
            return core.buffer.take(only_read);
        }

        let handle = core.waiters.enqueue();
        self.await_boundary(handle, wait, only_read).await
    }

    /// Park an already enqueued waiter until release or timeout, then take.
    async fn await_boundary(&self, handle: WaitHandle, wait: Duration, only_read: bool) -> Bytes {
        let core = &self.core;

        // Bytes may have landed, and been released, between the check and
        // the enqueue.
        if !core.buffer.is_empty() {
            return core.buffer.take(only_read);
        }

        let id = handle.id();
        match handle.wait(wait).await {
            WaitOutcome::Released(reason) => {
                tracing::trace!("Waiter {} released: {:?}", id, reason);
            }
            WaitOutcome::TimedOut => {
                tracing::trace!("Waiter {} timed out after {:?}", id, wait);
            }
        }

        core.buffer.take(only_read)
    }

    /// [`send`](Self::send) followed by [`receive`](Self::receive).
    ///
    /// Bytes left over from an earlier exchange are part of the result.
    pub async fn send_and_wait_result(
        &self,
        data: &[u8],
        wait: Duration,
        only_read: bool,
    ) -> Bytes {
        self.send(data).await;
        self.receive(wait, only_read).await
    }

    /// Non-destructive [`receive`](Self::receive).
    pub async fn peek(&self, wait: Duration) -> Bytes {
        self.receive(wait, true).await
    }

    /// Destructive [`receive`](Self::receive).
    pub async fn read_and_clear(&self, wait: Duration) -> Bytes {
        self.receive(wait, false).await
    }

    /// Discard buffered bytes without reading them.
    pub fn clear(&self) {
        self.core.buffer.clear();
    }

    /// Number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.core.buffer.len()
    }

    /// Number of callers currently waiting.
    pub fn pending_waiters(&self) -> usize {
        self.core.waiters.pending()
    }

    /// Most recently started debounce epoch.
    pub fn current_epoch(&self) -> DebounceEpoch {
        self.core.debounce.latest_epoch()
    }

    /// Whether a quiet-period timer is armed.
    pub fn debounce_armed(&self) -> bool {
        self.core.debounce.armed_epoch().is_some()
    }

    /// Configured quiet period.
    pub fn msg_wait_time(&self) -> Duration {
        self.core.debounce.quiet_period()
    }

    /// Tear down: stop the timer, release every waiter, close the transport.
    ///
    /// Idempotent. Returns the result of closing the transport.
    pub async fn shutdown(&self) -> bool {
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            self.core.shutdown();
        }
        self.close().await
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        // The transport closes itself on drop.
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            self.core.shutdown();
        }
    }
}

impl std::fmt::Debug for FrameSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSync")
            .field("core", &self.core)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
