//! Completeness oracle integration.
//!
//! The oracle is a caller-supplied predicate that decides whether the bytes
//! accumulated so far form a complete frame. Plain closures returning `bool`
//! implement [`CompletenessOracle`] directly; wrap a closure returning
//! `Result<bool>` in [`FallibleOracle`] when the check itself can fail.
//!
//! # Example
//!
//! ```
//! use framesync::sync::{CompletenessOracle, FallibleOracle};
//! use framesync::FrameSyncError;
//!
//! let delimited = |data: &[u8]| data.last() == Some(&b'\n');
//! assert!(delimited.check(b"OK\n").unwrap());
//!
//! let length_prefixed = FallibleOracle::new(|data: &[u8]| match data.first() {
//!     Some(&len) => Ok(data.len() == len as usize + 1),
//!     None => Err(FrameSyncError::OracleFailed("empty buffer".into())),
//! });
//! assert!(length_prefixed.check(&[2, 0xAA, 0xBB]).unwrap());
//! ```

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::Result;

/// Decides whether the accumulated buffer is a complete frame.
///
/// Runs synchronously on the accumulation path, so implementations must be
/// fast and must not block.
pub trait CompletenessOracle: Send + Sync + 'static {
    /// Check the full current buffer contents.
    fn check(&self, data: &[u8]) -> Result<bool>;
}

impl<F> CompletenessOracle for F
where
    F: Fn(&[u8]) -> bool + Send + Sync + 'static,
{
    fn check(&self, data: &[u8]) -> Result<bool> {
        Ok(self(data))
    }
}

/// Wrapper for predicates that can report their own failure.
pub struct FallibleOracle<F> {
    predicate: F,
}

impl<F> FallibleOracle<F>
where
    F: Fn(&[u8]) -> Result<bool> + Send + Sync + 'static,
{
    /// Wrap a fallible predicate.
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> CompletenessOracle for FallibleOracle<F>
where
    F: Fn(&[u8]) -> Result<bool> + Send + Sync + 'static,
{
    fn check(&self, data: &[u8]) -> Result<bool> {
        (self.predicate)(data)
    }
}

/// Outcome of one oracle evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The predicate accepted the buffer.
    Complete,
    /// The predicate rejected the buffer, or no oracle is registered.
    Incomplete,
    /// The predicate errored or panicked. Treated as incomplete.
    Failed(String),
}

impl Verdict {
    /// Whether waiters should be released now.
    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, Verdict::Complete)
    }
}

/// Single oracle slot held for the lifetime of an engine.
#[derive(Clone, Default)]
pub struct OracleSlot {
    oracle: Option<Arc<dyn CompletenessOracle>>,
}

impl OracleSlot {
    /// Slot with no oracle: every evaluation is incomplete.
    pub fn empty() -> Self {
        Self { oracle: None }
    }

    /// Slot holding the given oracle.
    pub fn new(oracle: Arc<dyn CompletenessOracle>) -> Self {
        Self {
            oracle: Some(oracle),
        }
    }

    /// Whether an oracle is registered.
    pub fn is_registered(&self) -> bool {
        self.oracle.is_some()
    }

    /// Evaluate the oracle, containing errors and panics.
    pub fn evaluate(&self, data: &[u8]) -> Verdict {
        let Some(oracle) = &self.oracle else {
            return Verdict::Incomplete;
        };

        match catch_unwind(AssertUnwindSafe(|| oracle.check(data))) {
            Ok(Ok(true)) => Verdict::Complete,
            Ok(Ok(false)) => Verdict::Incomplete,
            Ok(Err(e)) => Verdict::Failed(e.to_string()),
            Err(panic) => Verdict::Failed(format!("oracle panicked: {}", panic_message(&*panic))),
        }
    }
}

impl std::fmt::Debug for OracleSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
