//! Object store spoken over plain HTTP `HEAD`/`PUT` against a custom
//! endpoint.
//!
//! For S3-compatible gateways that accept unsigned or bearer-token
//! requests with a chunked body. AWS itself goes through
//! [`super::S3ObjectStore`].

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};
use runonce_core::api::{ObjectBody, ObjectStore, ObjectStoreError};
use tokio::io::AsyncReadExt;

const BODY_PREVIEW_LIMIT: usize = 512;
const UPLOAD_CHUNK_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    http: reqwest::Client,
    /// Objects live at `<endpoint>/<bucket>/<key>`.
    endpoint: Url,
    token: Option<String>,
}

impl HttpObjectStore {
    /// Path-style store rooted at `endpoint`, e.g. `http://localhost:9000`.
    pub fn path_style(endpoint: &str, token: Option<String>) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| anyhow::anyhow!("invalid object store endpoint {endpoint}: {e}"))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("invalid object store endpoint {endpoint}: not a base URL");
        }
        // No overall timeout: an upload lasts as long as the command runs.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url, ObjectStoreError> {
        let mut url = self.endpoint.clone();
        push_segments(&mut url, std::iter::once(bucket))?;
        push_segments(&mut url, key.split('/'))?;
        Ok(url)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

fn push_segments<'a>(
    url: &mut Url,
    segments: impl Iterator<Item = &'a str>,
) -> Result<(), ObjectStoreError> {
    let display = url.to_string();
    let mut path = url.path_segments_mut().map_err(|_| ObjectStoreError::Request {
        url: display,
        message: "URL cannot hold a path".to_string(),
    })?;
    path.pop_if_empty().extend(segments);
    Ok(())
}

fn request_error(err: reqwest::Error, url: &Url) -> ObjectStoreError {
    ObjectStoreError::Request {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    if trimmed.chars().count() > BODY_PREVIEW_LIMIT {
        out.push_str("...");
    }
    out
}

async fn status_error(resp: reqwest::Response, url: &Url) -> ObjectStoreError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ObjectStoreError::Status {
        status,
        url: url.to_string(),
        body: preview_body(&body),
    }
}

/// Feed the body to reqwest chunk by chunk as the writer produces it.
fn body_stream(mut body: ObjectBody) -> reqwest::Body {
    let stream = async_stream::stream! {
        let mut buf = vec![0u8; UPLOAD_CHUNK_BYTES];
        loop {
            match body.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield Ok::<Bytes, io::Error>(Bytes::copy_from_slice(&buf[..n])),
                Err(err) => {
                    yield Err(err);
                    break;
                }
            }
        }
    };
    reqwest::Body::wrap_stream(stream)
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, ObjectStoreError> {
        let url = self.object_url(bucket, key)?;
        tracing::debug!(url = %url, "object store head");
        let resp = self
            .auth(self.http.head(url.clone()))
            .send()
            .await
            .map_err(|err| request_error(err, &url))?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(resp, &url).await),
        }
    }

    async fn put(&self, bucket: &str, key: &str, body: ObjectBody) -> Result<(), ObjectStoreError> {
        let url = self.object_url(bucket, key)?;
        tracing::debug!(url = %url, "object store put started");
        let resp = self
            .auth(self.http.put(url.clone()))
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body_stream(body))
            .send()
            .await
            .map_err(|err| request_error(err, &url))?;
        if !resp.status().is_success() {
            return Err(status_error(resp, &url).await);
        }
        tracing::debug!(url = %url, status = %resp.status(), "object store put finished");
        Ok(())
    }
}
