use std::sync::Arc;

use anyhow::Result;

use runonce_core::api::{
    AppConfig, CompositeDestination, Destination, LocalDestination, ObjectStore,
    ObjectStoreConfig, StreamingRemoteDestination,
};

use crate::object_store::{HttpObjectStore, S3ObjectStore};

/// A custom endpoint gets the plain HTTP store; otherwise AWS S3 with the
/// default credential chain.
pub async fn build_object_store(cfg: &ObjectStoreConfig) -> Result<Option<Arc<dyn ObjectStore>>> {
    if !cfg.is_enabled() {
        return Ok(None);
    }
    let store: Arc<dyn ObjectStore> =
        match cfg.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(endpoint) => Arc::new(HttpObjectStore::path_style(endpoint, cfg.token.clone())?),
            None => Arc::new(S3ObjectStore::connect(cfg.region.clone()).await),
        };
    Ok(Some(store))
}

/// Object store first, then the local directory; the current directory
/// when neither is configured.
pub async fn build_destination(cfg: &AppConfig) -> Result<Box<dyn Destination>> {
    let mut members: Vec<Box<dyn Destination>> = Vec::with_capacity(2);

    if let Some(store) = build_object_store(&cfg.s3).await? {
        let bucket = cfg.s3.bucket.clone().unwrap_or_default();
        tracing::debug!(bucket = %bucket, prefix = %cfg.s3.object_prefix, "object store log destination");
        members.push(Box::new(
            StreamingRemoteDestination::new(store, bucket)
                .with_prefix(cfg.s3.object_prefix.clone())
                .with_buffer_bytes(cfg.upload.buffer_bytes),
        ));
    }

    if let Some(dir) = cfg.file.dir.as_deref().filter(|d| !d.trim().is_empty()) {
        members.push(Box::new(
            LocalDestination::new(dir).with_postfix(cfg.file.log_file_postfix.clone()),
        ));
    }

    if members.is_empty() {
        let cwd = std::env::current_dir()
            .map_err(|e| anyhow::anyhow!("can not get working directory: {e}"))?;
        members.push(Box::new(LocalDestination::new(cwd)));
    }

    if members.len() == 1 {
        if let Some(only) = members.pop() {
            return Ok(only);
        }
    }
    Ok(Box::new(CompositeDestination::new(members)))
}
