//! Receive accumulator.
//!
//! Append-only byte buffer fed by the transport. Every mutation happens
//! under one lock, and every value handed out is an owned [`Bytes`] that no
//! later append or clear can touch.
//!
//! # Example
//!
//! ```
//! use framesync::sync::ReceiveBuffer;
//!
//! let buffer = ReceiveBuffer::new();
//! buffer.append(&[0x01, 0x02]);
//! buffer.append(&[0x03]);
//!
//! assert_eq!(&buffer.snapshot()[..], &[0x01, 0x02, 0x03]);
//! assert_eq!(&buffer.snapshot_and_clear()[..], &[0x01, 0x02, 0x03]);
//! assert!(buffer.is_empty());
//! ```

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;

use crate::config::{DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_BUFFER_LEN};

/// Thread-safe receive buffer.
#[derive(Debug)]
pub struct ReceiveBuffer {
    /// Accumulated bytes from the transport.
    inner: Mutex<BytesMut>,
    /// Maximum retained bytes; the oldest are discarded beyond this.
    max_len: usize,
}

impl ReceiveBuffer {
    /// Create a buffer with default capacity and cap.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_BUFFER_LEN)
    }

    /// Create a buffer with a custom initial allocation and cap.
    pub fn with_limits(capacity: usize, max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            inner: Mutex::new(BytesMut::with_capacity(capacity.min(max_len))),
            max_len,
        }
    }

    /// Append bytes and return a snapshot of the full buffer as it stands
    /// right after this append.
    ///
    /// The snapshot is taken under the same lock as the write, so it is
    /// exactly what a completeness check for this append must see.
    pub fn append(&self, data: &[u8]) -> Bytes {
        let mut buf = self.inner.lock();

        let dropped = if data.len() >= self.max_len {
            let dropped = buf.len() + data.len() - self.max_len;
            buf.clear();
            buf.extend_from_slice(&data[data.len() - self.max_len..]);
            dropped
        } else {
            let overflow = (buf.len() + data.len()).saturating_sub(self.max_len);
            if overflow > 0 {
                buf.advance(overflow);
            }
            buf.extend_from_slice(data);
            overflow
        };

        if dropped > 0 {
            tracing::warn!(
                "Receive buffer exceeded {} bytes, discarded {} oldest bytes",
                self.max_len,
                dropped
            );
        }

        Bytes::copy_from_slice(&buf)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.inner.lock())
    }

    /// Take the current contents and leave the buffer empty, atomically.
    pub fn snapshot_and_clear(&self) -> Bytes {
        self.inner.lock().split().freeze()
    }

    /// Either [`snapshot`](Self::snapshot) or
    /// [`snapshot_and_clear`](Self::snapshot_and_clear).
    pub fn take(&self, only_read: bool) -> Bytes {
        if only_read {
            self.snapshot()
        } else {
            self.snapshot_and_clear()
        }
    }

    /// Discard all buffered bytes.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Configured cap.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}
