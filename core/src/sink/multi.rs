use std::io;

use async_trait::async_trait;

use super::{LogSink, SinkHandle};

/// Duplicates every write to each member, in order.
///
/// A write stops at the first member that fails; members after it do not
/// see the bytes.
pub struct MultiSink {
    sinks: Vec<SinkHandle>,
}

impl MultiSink {
    pub fn new(sinks: Vec<SinkHandle>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl LogSink for MultiSink {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        for sink in &self.sinks {
            sink.write_all(buf).await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(err) = sink.flush().await {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
