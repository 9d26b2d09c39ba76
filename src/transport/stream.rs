//! Stream transport adapter.
//!
//! Wraps any `AsyncRead + AsyncWrite` stream. On `open` the connector is
//! invoked, the stream is split, and a reader task forwards every chunk to
//! the engine. The write half stays with the transport.
//!
//! # Example
//!
//! ```ignore
//! use framesync::transport::StreamTransport;
//!
//! // Reconnectable: the connector runs on every open()
//! let transport = StreamTransport::new(|| async {
//!     tokio::net::TcpStream::connect("127.0.0.1:5020").await
//! });
//!
//! // One-shot: an already connected stream
//! let (client, _device) = tokio::io::duplex(1024);
//! let transport = StreamTransport::from_stream(client);
//! ```

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::task::JoinHandle;

use super::{BoxFuture, Transport};
use crate::sync::InboundSink;

/// Size of each read from the underlying stream.
pub const READ_CHUNK_SIZE: usize = 4 * 1024;

type Connector<S> = Box<dyn FnMut() -> BoxFuture<'static, io::Result<S>> + Send>;

/// [`Transport`] over an async byte stream.
pub struct StreamTransport<S> {
    /// Produces a fresh connected stream on each open.
    connector: Connector<S>,
    /// Write half while open.
    writer: Option<WriteHalf<S>>,
    /// Reader task while open.
    reader: Option<JoinHandle<()>>,
    /// Cleared by the reader task on EOF or read error.
    alive: Arc<AtomicBool>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create a transport that calls `connector` on every open.
    pub fn new<F, Fut>(mut connector: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<S>> + Send + 'static,
    {
        Self {
            connector: Box::new(move || -> BoxFuture<'static, io::Result<S>> {
                Box::pin(connector())
            }),
            writer: None,
            reader: None,
            alive: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a transport around an already connected stream.
    ///
    /// Only the first open succeeds; later opens fail with
    /// `ErrorKind::NotConnected`.
    pub fn from_stream(stream: S) -> Self {
        let mut slot = Some(stream);
        Self::new(move || {
            let stream = slot.take();
            async move {
                stream.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotConnected, "stream already consumed")
                })
            }
        })
    }

    fn teardown(&mut self) -> Option<WriteHalf<S>> {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.alive.store(false, Ordering::Release);
        self.writer.take()
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn is_open(&self) -> bool {
        self.writer.is_some() && self.alive.load(Ordering::Acquire)
    }

    fn open(&mut self, sink: InboundSink) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            // Drop whatever is left of a previous connection
            self.teardown();

            let stream = (self.connector)().await?;
            let (read_half, write_half) = tokio::io::split(stream);

            // Fresh flag so a lingering reader from the last connection
            // cannot mark this one closed.
            self.alive = Arc::new(AtomicBool::new(true));
            self.writer = Some(write_half);
            self.reader = Some(tokio::spawn(read_loop(read_half, sink, self.alive.clone())));
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            match self.teardown() {
                Some(mut writer) => writer.shutdown().await,
                None => Ok(()),
            }
        })
    }

    fn write<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            let writer = self.writer.as_mut().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, "transport is not open")
            })?;
            writer.write_all(data).await?;
            writer.flush().await
        })
    }
}

impl<S> Drop for StreamTransport<S> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Reads chunks and forwards them until EOF, error, or engine drop.
async fn read_loop<R>(mut reader: R, sink: InboundSink, alive: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                if !sink.report("Transport reached EOF, link closed") {
                    tracing::debug!("Transport reached EOF");
                }
                break;
            }
            Ok(n) => n,
            Err(e) => {
                if !sink.report(&format!("Transport read error, link closed: {}", e)) {
                    tracing::error!("Transport read error: {}", e);
                }
                break;
            }
        };

        if !sink.deliver(&buf[..n]) {
            tracing::debug!("Engine dropped, stopping reader");
            break;
        }
    }

    alive.store(false, Ordering::Release);
}
