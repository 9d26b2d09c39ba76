//! Transport module - the byte channel underneath the engine.
//!
//! The engine never touches a device directly. It drives a [`Transport`]
//! for open/close/write and receives bytes through the
//! [`InboundSink`](crate::sync::InboundSink) handed to `open`.
//!
//! - [`StreamTransport`] - adapter for any `AsyncRead + AsyncWrite` stream
//!   (serial port streams, TCP, `tokio::io::duplex`)

mod stream;

use std::future::Future;
use std::io;
use std::pin::Pin;

use crate::sync::InboundSink;

pub use stream::{StreamTransport, READ_CHUNK_SIZE};

/// Boxed future returned by transport operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Byte-oriented channel driven by the engine.
///
/// Calls are serialized by the engine: `open`, `close` and `write` never run
/// concurrently with each other.
pub trait Transport: Send + 'static {
    /// Whether the channel is currently usable for writes.
    fn is_open(&self) -> bool;

    /// Open the channel and start delivering arriving bytes to `sink`.
    fn open(&mut self, sink: InboundSink) -> BoxFuture<'_, io::Result<()>>;

    /// Close the channel and stop delivering.
    fn close(&mut self) -> BoxFuture<'_, io::Result<()>>;

    /// Write all of `data`.
    fn write<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, io::Result<()>>;
}
