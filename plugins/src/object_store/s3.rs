//! AWS S3 via the official SDK: credentials from the default provider
//! chain, uploads as multipart so the transcript never has to be buffered
//! in full.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use runonce_core::api::{ObjectBody, ObjectStore, ObjectStoreError};
use tokio::io::AsyncReadExt;

/// Part size for multipart uploads. S3 requires at least 5 MiB for every
/// part but the last.
pub const PART_BYTES: usize = 8 * 1024 * 1024;

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    part_bytes: usize,
}

impl S3ObjectStore {
    /// Load region and credentials the way the AWS CLI does; `region`
    /// overrides the environment when set.
    pub async fn connect(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region.filter(|r| !r.trim().is_empty()) {
            loader = loader.region(Region::new(region));
        }
        let conf = loader.load().await;
        Self::from_client(Client::new(&conf))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            part_bytes: PART_BYTES,
        }
    }

    pub fn with_part_bytes(mut self, part_bytes: usize) -> Self {
        self.part_bytes = part_bytes.max(1);
        self
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(CONTENT_TYPE)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| sdk_error(bucket, key, err))?;
        Ok(())
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first: Vec<u8>,
        body: &mut ObjectBody,
    ) -> Result<Vec<CompletedPart>, ObjectStoreError> {
        let mut parts = Vec::new();
        let mut part = first;
        let mut number: i32 = 1;
        loop {
            let out = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(number)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(|err| sdk_error(bucket, key, err))?;
            tracing::debug!(bucket = %bucket, key = %key, part = number, "part uploaded");
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(out.e_tag().map(str::to_string))
                    .part_number(number)
                    .build(),
            );

            part = read_part(body, self.part_bytes).await?;
            if part.is_empty() {
                return Ok(parts);
            }
            number += 1;
        }
    }
}

fn sdk_error<E>(bucket: &str, key: &str, err: E) -> ObjectStoreError
where
    E: std::error::Error,
{
    ObjectStoreError::Request {
        url: format!("s3://{bucket}/{key}"),
        message: DisplayErrorContext(&err).to_string(),
    }
}

/// Read until `limit` bytes or EOF, whichever comes first.
async fn read_part(body: &mut ObjectBody, limit: usize) -> Result<Vec<u8>, ObjectStoreError> {
    let mut buf = Vec::with_capacity(limit.min(64 * 1024));
    (&mut *body).take(limit as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, ObjectStoreError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) => {
                Ok(false)
            }
            Err(err) => Err(sdk_error(bucket, key, err)),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        mut body: ObjectBody,
    ) -> Result<(), ObjectStoreError> {
        let first = read_part(&mut body, self.part_bytes).await?;
        if first.len() < self.part_bytes {
            tracing::debug!(bucket = %bucket, key = %key, bytes = first.len(), "single put");
            return self.put_single(bucket, key, first).await;
        }

        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(CONTENT_TYPE)
            .send()
            .await
            .map_err(|err| sdk_error(bucket, key, err))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| ObjectStoreError::Request {
                url: format!("s3://{bucket}/{key}"),
                message: "multipart upload created without an upload id".to_string(),
            })?
            .to_string();

        let uploaded = self
            .upload_parts(bucket, key, &upload_id, first, &mut body)
            .await;
        let parts = match uploaded {
            Ok(parts) => parts,
            Err(err) => {
                let aborted = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                if let Err(abort_err) = aborted {
                    tracing::warn!(
                        bucket = %bucket,
                        key = %key,
                        error = %DisplayErrorContext(&abort_err),
                        "abort multipart upload failed"
                    );
                }
                return Err(err);
            }
        };

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|err| sdk_error(bucket, key, err))?;
        Ok(())
    }
}
