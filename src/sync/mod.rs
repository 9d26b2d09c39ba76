//! Frame-boundary synchronization components.
//!
//! - [`ReceiveBuffer`] - thread-safe accumulator with copy-out snapshots
//! - [`CompletenessOracle`] - caller predicate that ends a frame early
//! - [`DebounceScheduler`] - epoch-tagged quiet-period timer
//! - [`WaiterRegistry`] - release-all queue of blocked callers
//! - [`InboundSink`] - entry point for bytes arriving from a transport
//!
//! The [`FrameSync`](crate::FrameSync) facade wires these together; they are
//! public so custom engines and tests can use them directly.

mod accumulator;
mod debounce;
mod ingest;
mod oracle;
mod waiters;

pub(crate) use ingest::SyncCore;

pub use accumulator::ReceiveBuffer;
pub use debounce::{DebounceEpoch, DebounceScheduler};
pub use ingest::InboundSink;
pub use oracle::{CompletenessOracle, FallibleOracle, OracleSlot, Verdict};
pub use waiters::{ReleaseReason, WaitHandle, WaitOutcome, WaiterRegistry};
