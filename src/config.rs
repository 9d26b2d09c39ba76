//! Engine configuration.
//!
//! [`SyncConfig`] can be built in code, loaded from JSON, or tuned through
//! the [`FrameSyncBuilder`](crate::FrameSyncBuilder). Validation happens once,
//! when the engine is built.
//!
//! # Example
//!
//! ```
//! use framesync::SyncConfig;
//!
//! let config = SyncConfig::from_json(r#"{ "msg_wait_ms": 50 }"#).unwrap();
//! assert_eq!(config.msg_wait_ms, 50);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FrameSyncError, Result};

/// Default quiet period before buffered bytes are treated as a frame.
pub const DEFAULT_MSG_WAIT_MS: i64 = 35;

/// Upper bound accepted for the quiet period.
pub const MAX_MSG_WAIT_MS: i64 = 60_000;

/// Default accumulator cap.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 64 * 1024;

/// Default preallocated accumulator size.
pub const DEFAULT_INITIAL_CAPACITY: usize = 4 * 1024;

/// Configuration for a [`FrameSync`](crate::FrameSync) engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period in milliseconds. Signed so that a negative value coming
    /// from an external config is reported instead of silently wrapped.
    pub msg_wait_ms: i64,
    /// Maximum number of bytes retained in the receive buffer.
    pub max_buffer_len: usize,
    /// Initial receive buffer allocation.
    pub initial_capacity: usize,
}

impl SyncConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.msg_wait_ms < 0 {
            return Err(FrameSyncError::InvalidConfig(format!(
                "msg_wait_ms must not be negative (got {})",
                self.msg_wait_ms
            )));
        }
        if self.msg_wait_ms > MAX_MSG_WAIT_MS {
            return Err(FrameSyncError::InvalidConfig(format!(
                "msg_wait_ms {} exceeds maximum {}",
                self.msg_wait_ms, MAX_MSG_WAIT_MS
            )));
        }
        if self.max_buffer_len == 0 {
            return Err(FrameSyncError::InvalidConfig(
                "max_buffer_len must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Quiet period as a `Duration`. Negative values clamp to zero; call
    /// [`validate`](Self::validate) first to reject them.
    pub fn msg_wait_time(&self) -> Duration {
        Duration::from_millis(self.msg_wait_ms.max(0) as u64)
    }

    /// Initial allocation, never larger than the buffer cap.
    pub fn effective_capacity(&self) -> usize {
        self.initial_capacity.min(self.max_buffer_len)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            msg_wait_ms: DEFAULT_MSG_WAIT_MS,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}
