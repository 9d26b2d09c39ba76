//! Optional operator-facing diagnostic hook.
//!
//! Messages always go to `tracing`; when a callback is registered the same
//! text is forwarded to it. The callback never influences control flow and a
//! panic inside it is swallowed.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Callback receiving human-readable diagnostic lines.
pub type DiagnosticFn = dyn Fn(&str) + Send + Sync + 'static;

/// Diagnostic sink shared by the engine components.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<DiagnosticFn>>,
}

impl Diagnostics {
    /// Forward diagnostics to `callback` in addition to `tracing`.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            sink: Some(Arc::new(callback)),
        }
    }

    /// Diagnostics that only go to `tracing`.
    pub fn none() -> Self {
        Self { sink: None }
    }

    /// Log at debug level and forward.
    pub fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
        self.forward(message);
    }

    /// Log at warn level and forward.
    pub fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
        self.forward(message);
    }

    fn forward(&self, message: &str) {
        if let Some(sink) = &self.sink {
            if catch_unwind(AssertUnwindSafe(|| sink(message))).is_err() {
                tracing::warn!("Diagnostic callback panicked");
            }
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("callback", &self.sink.is_some())
            .finish()
    }
}
