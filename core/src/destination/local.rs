use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::BufWriter;

use super::{postfix_or_default, Destination};
use crate::error::DestinationError;
use crate::sink::{SinkHandle, StreamPair};

/// A transcript written to `<dir>/<name><postfix>`.
#[derive(Debug)]
pub struct LocalDestination {
    dir: PathBuf,
    postfix: String,
    name: String,
    writer: Option<SinkHandle>,
}

impl LocalDestination {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            postfix: String::new(),
            name: String::new(),
            writer: None,
        }
    }

    /// Log directory defaults to the current working directory.
    pub fn in_current_dir() -> Self {
        let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(dir)
    }

    pub fn with_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = postfix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir
            .join(format!("{}{}", self.name, postfix_or_default(&self.postfix)))
    }
}

impl fmt::Display for LocalDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

#[async_trait]
impl Destination for LocalDestination {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    async fn exists(&self) -> Result<bool, DestinationError> {
        // Any stat failure, not-found included, counts as "not there".
        Ok(tokio::fs::metadata(self.path()).await.is_ok())
    }

    async fn open(&mut self) -> Result<StreamPair, DestinationError> {
        let file = tokio::fs::File::create(self.path()).await?;
        let writer = SinkHandle::from_writer(BufWriter::new(file));
        self.writer = Some(writer.clone());
        Ok(StreamPair::combined(writer))
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        if let Err(err) = writer.shutdown().await {
            tracing::warn!(path = %self, error = %err, "log file flush/close failed");
        }
        Ok(())
    }
}
