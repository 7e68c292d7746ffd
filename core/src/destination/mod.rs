//! Where execution transcripts go.

mod composite;
mod local;
mod object_store;
mod remote;

use std::fmt;

use async_trait::async_trait;

use crate::error::DestinationError;
use crate::sink::StreamPair;

pub use composite::CompositeDestination;
pub use local::LocalDestination;
pub use object_store::{ObjectBody, ObjectStore};
pub use remote::{StreamingRemoteDestination, DEFAULT_UPLOAD_BUFFER_BYTES};

pub const DEFAULT_LOG_POSTFIX: &str = ".log";

/// A named sink for one execution log.
///
/// `Display` renders the resolved location. It and [`Destination::exists`]
/// are usable right after [`Destination::set_name`], before any `open`.
#[async_trait]
pub trait Destination: fmt::Display + Send + Sync {
    /// Bind the guard's name. Called once, before any other method.
    fn set_name(&mut self, name: &str);

    async fn exists(&self) -> Result<bool, DestinationError>;

    async fn open(&mut self) -> Result<StreamPair, DestinationError>;

    /// Release whatever `open` acquired. Safe to call when `open` was never
    /// called or failed.
    async fn close(&mut self) -> Result<(), DestinationError>;
}

pub(crate) fn postfix_or_default(postfix: &str) -> &str {
    if postfix.is_empty() {
        DEFAULT_LOG_POSTFIX
    } else {
        postfix
    }
}
