use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::ObjectStoreError;

/// Body of a streaming upload; read until EOF by the store.
pub type ObjectBody = Box<dyn AsyncRead + Unpin + Send + Sync>;

/// The two object-store calls a streaming destination needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata-only existence check. A "not found" answer is `Ok(false)`.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, ObjectStoreError>;

    /// Upload `body` as one object, reading it as it arrives.
    async fn put(&self, bucket: &str, key: &str, body: ObjectBody) -> Result<(), ObjectStoreError>;
}
