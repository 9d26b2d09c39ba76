//! Error types for framesync.

use thiserror::Error;

/// Main error type for all framesync operations.
///
/// Only construction and configuration paths surface these to callers.
/// The synchronization facade converts transport failures into `bool`
/// results and oracle failures into log lines.
#[derive(Debug, Error)]
pub enum FrameSyncError {
    /// Invalid configuration passed to the builder or config loader.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine was built outside a tokio runtime.
    #[error("No tokio runtime available to drive the debounce timer")]
    NoRuntime,

    /// I/O error during transport operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation requires an open transport.
    #[error("Transport is not open")]
    NotOpen,

    /// A fallible completeness oracle reported an error.
    #[error("Completeness oracle failed: {0}")]
    OracleFailed(String),
}

/// Result type alias using FrameSyncError.
pub type Result<T> = std::result::Result<T, FrameSyncError>;
