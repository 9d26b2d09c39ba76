//! # framesync
//!
//! Frame-boundary synchronization for byte-oriented transports.
//!
//! Bytes arrive from a transport (serial line, socket, pipe) in arbitrary
//! chunks. Callers want whole frames. `framesync` accumulates the bytes and
//! releases waiting callers when either:
//!
//! - the registered **completeness oracle** says the buffer is a complete
//!   frame, or
//! - no new byte arrived for the configured **quiet period**
//!   (`msg_wait_ms`), which is treated as an implicit frame boundary.
//!
//! ## Architecture
//!
//! ```text
//! transport reader ─► InboundSink::deliver ─► ReceiveBuffer::append
//!                                                  │
//!                                       CompletenessOracle::check
//!                                        │                      │
//!                                   complete                incomplete
//!                                        │                      │
//!                          cancel timer, release all   DebounceScheduler::restart
//!                                                               │ (quiet period)
//!                                                          release all
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use framesync::{FrameSync, StreamTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (port, _device) = tokio::io::duplex(1024);
//!     let sync = FrameSync::builder()
//!         .msg_wait_ms(35)
//!         .build(StreamTransport::from_stream(port))
//!         .unwrap();
//!
//!     sync.open().await;
//!     let frame = sync.read_and_clear(Duration::from_millis(100)).await;
//!     println!("{} bytes", frame.len());
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod sync;
pub mod transport;

mod frame_sync;

pub use config::SyncConfig;
pub use error::{FrameSyncError, Result};
pub use frame_sync::{FrameSync, FrameSyncBuilder};
pub use sync::{FallibleOracle, ReleaseReason};
pub use transport::{StreamTransport, Transport};
