use std::fmt;
use std::io;
use std::sync::Arc;

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::{postfix_or_default, Destination, ObjectStore};
use crate::error::{DestinationError, ObjectStoreError};
use crate::sink::{LogSink, SinkHandle, StreamPair};

pub const DEFAULT_UPLOAD_BUFFER_BYTES: usize = 64 * 1024;

/// A transcript streamed to an object store while it is being written.
///
/// Bytes travel through a bounded in-memory pipe to one upload worker, so
/// memory use is capped by the pipe capacity no matter how long the
/// transcript gets.
pub struct StreamingRemoteDestination {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    postfix: String,
    buffer_bytes: usize,
    name: String,
    upload: Option<Upload>,
}

struct Upload {
    sink: SinkHandle,
    state: Arc<UploadState>,
    worker: JoinHandle<()>,
}

/// Worker outcome shared with the write side.
struct UploadState {
    error: Mutex<Option<ObjectStoreError>>,
}

impl UploadState {
    async fn take_error(&self) -> Option<ObjectStoreError> {
        self.error.lock().await.take()
    }
}

impl StreamingRemoteDestination {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: String::new(),
            postfix: String::new(),
            buffer_bytes: DEFAULT_UPLOAD_BUFFER_BYTES,
            name: String::new(),
            upload: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = postfix.into();
        self
    }

    /// Capacity of the pipe between the writer and the upload worker.
    pub fn with_buffer_bytes(mut self, buffer_bytes: usize) -> Self {
        self.buffer_bytes = buffer_bytes.max(1);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `prefix + name + postfix`, without a leading `/`.
    pub fn key(&self) -> String {
        let key = format!(
            "{}{}{}",
            self.prefix,
            self.name,
            postfix_or_default(&self.postfix)
        );
        key.trim_start_matches('/').to_string()
    }
}

impl fmt::Display for StreamingRemoteDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key())
    }
}

#[async_trait]
impl Destination for StreamingRemoteDestination {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    async fn exists(&self) -> Result<bool, DestinationError> {
        Ok(self.store.exists(&self.bucket, &self.key()).await?)
    }

    async fn open(&mut self) -> Result<StreamPair, DestinationError> {
        let (writer, reader) = tokio::io::duplex(self.buffer_bytes);
        let (done_tx, done_rx) = watch::channel(false);
        let state = Arc::new(UploadState {
            error: Mutex::new(None),
        });

        let store = self.store.clone();
        let bucket = self.bucket.clone();
        let key = self.key();
        let worker_state = state.clone();
        // The worker owns `done_tx`: however it ends, waiters are released.
        let worker = tokio::spawn(async move {
            tracing::debug!(bucket = %bucket, key = %key, "upload worker started");
            let put = AssertUnwindSafe(store.put(&bucket, &key, Box::new(reader)))
                .catch_unwind()
                .await;
            let failure = match put {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err),
                Err(panic) => Some(ObjectStoreError::Worker(format!(
                    "upload worker panicked: {}",
                    panic_text(panic.as_ref())
                ))),
            };
            if let Some(err) = failure {
                tracing::error!(bucket = %bucket, key = %key, error = %err, "upload failed");
                *worker_state.error.lock().await = Some(err);
            }
            done_tx.send_replace(true);
        });

        let sink = SinkHandle::new(UploadSink {
            pipe: writer,
            state: state.clone(),
            done: done_rx,
        });
        self.upload = Some(Upload {
            sink: sink.clone(),
            state,
            worker,
        });
        Ok(StreamPair::combined(sink))
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        let Some(upload) = self.upload.take() else {
            return Ok(());
        };
        if let Err(err) = upload.sink.shutdown().await {
            tracing::debug!(destination = %self, error = %err, "pipe writer close failed");
        }
        if let Err(err) = upload.worker.await {
            return Err(DestinationError::Upload(ObjectStoreError::Worker(
                err.to_string(),
            )));
        }
        match upload.state.take_error().await {
            Some(err) => Err(DestinationError::Upload(err)),
            None => Ok(()),
        }
    }
}

/// Producer half of the pipe, handed to the guard.
struct UploadSink {
    pipe: DuplexStream,
    state: Arc<UploadState>,
    done: watch::Receiver<bool>,
}

impl UploadSink {
    /// Replace a pipe error with the worker's failure, if it has one.
    async fn explain(&mut self, err: io::Error) -> io::Error {
        // Err here means the worker is gone without signalling.
        if self.done.wait_for(|done| *done).await.is_err() {
            tracing::debug!("upload worker ended without signalling completion");
            return io::Error::other(DestinationError::Upload(ObjectStoreError::Worker(
                "upload worker terminated".to_string(),
            )));
        }
        match self.state.take_error().await {
            Some(upload_err) => io::Error::other(DestinationError::Upload(upload_err)),
            None => err,
        }
    }
}

#[async_trait]
impl LogSink for UploadSink {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Some(err) = self.state.take_error().await {
            return Err(io::Error::other(DestinationError::Upload(err)));
        }
        match self.pipe.write_all(buf).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.explain(err).await),
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.pipe.flush().await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.pipe.shutdown().await
    }
}

fn panic_text(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
