use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::LogSink;

/// Adapts any tokio writer into a [`LogSink`].
pub struct WriterSink<W> {
    inner: W,
}

impl<W> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W> LogSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}
