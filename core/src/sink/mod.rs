//! Byte sinks the transcript is written through.
//!
//! A [`SinkHandle`] is shared between the destination that owns the
//! underlying writer and every fan-out that feeds it. Cloning a handle
//! aliases the same sink, which is how a destination that does not
//! distinguish stdout from stderr reports that fact.

mod multi;
mod writer;

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

pub use multi::MultiSink;
pub use writer::WriterSink;

#[async_trait]
pub trait LogSink: Send {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    async fn flush(&mut self) -> io::Result<()>;

    /// Signal end-of-stream to whatever reads this sink.
    async fn shutdown(&mut self) -> io::Result<()> {
        self.flush().await
    }
}

#[derive(Clone)]
pub struct SinkHandle {
    inner: Arc<Mutex<Box<dyn LogSink>>>,
}

impl SinkHandle {
    pub fn new<S>(sink: S) -> Self
    where
        S: LogSink + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    pub fn from_writer<W>(writer: W) -> Self
    where
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        Self::new(WriterSink::new(writer))
    }

    /// Process stdout, used to echo the transcript live.
    pub fn stdout() -> Self {
        Self::from_writer(tokio::io::stdout())
    }

    /// Process stderr, used to echo the transcript live.
    pub fn stderr() -> Self {
        Self::from_writer(tokio::io::stderr())
    }

    pub async fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.inner.lock().await.write_all(buf).await
    }

    pub async fn write_str(&self, s: &str) -> io::Result<()> {
        self.write_all(s.as_bytes()).await
    }

    pub async fn flush(&self) -> io::Result<()> {
        self.inner.lock().await.flush().await
    }

    pub async fn shutdown(&self) -> io::Result<()> {
        self.inner.lock().await.shutdown().await
    }

    /// True when both handles point at the same underlying sink.
    pub fn same_as(&self, other: &SinkHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkHandle")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

/// The stdout/stderr channel pair a destination hands out on open.
#[derive(Debug, Clone)]
pub struct StreamPair {
    pub stdout: SinkHandle,
    pub stderr: SinkHandle,
}

impl StreamPair {
    pub fn new(stdout: SinkHandle, stderr: SinkHandle) -> Self {
        Self { stdout, stderr }
    }

    /// Both channels alias one sink.
    pub fn combined(sink: SinkHandle) -> Self {
        Self {
            stdout: sink.clone(),
            stderr: sink,
        }
    }

    pub fn is_combined(&self) -> bool {
        self.stdout.same_as(&self.stderr)
    }

    /// A single sink receiving everything written to the pair: the shared
    /// sink when combined, otherwise a fan-out to both channels.
    pub fn merged(&self) -> SinkHandle {
        if self.is_combined() {
            self.stdout.clone()
        } else {
            SinkHandle::new(MultiSink::new(vec![
                self.stdout.clone(),
                self.stderr.clone(),
            ]))
        }
    }

    /// Pair each channel with the matching channel of `other`.
    pub fn tee(&self, other: &StreamPair) -> StreamPair {
        StreamPair {
            stdout: SinkHandle::new(MultiSink::new(vec![
                self.stdout.clone(),
                other.stdout.clone(),
            ])),
            stderr: SinkHandle::new(MultiSink::new(vec![
                self.stderr.clone(),
                other.stderr.clone(),
            ])),
        }
    }
}
