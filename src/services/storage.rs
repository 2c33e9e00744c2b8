use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage upload failed: {status} {body}")]
    Upstream { status: u16, body: String },

    #[error("Storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Binary object storage for generated images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` and return a URL clients can read.
    async fn upload(&self, bytes: Vec<u8>, content_type: &str, path: &str)
        -> Result<String, StorageError>;
}

/// Google Cloud Storage via the JSON upload API.
pub struct GcsStorage {
    http: reqwest::Client,
    bucket: String,
    access_token: String,
    public_base: String,
}

impl GcsStorage {
    pub fn new(config: &Config, bucket: String) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            bucket,
            access_token: config.gcs_access_token.clone(),
            public_base: config.gcs_public_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStorage for GcsStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        path: &str,
    ) -> Result<String, StorageError> {
        let url = format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{}/o",
            self.bucket
        );
        let response = self
            .http
            .post(url)
            .query(&[("uploadType", "media"), ("name", path)])
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CACHE_CONTROL, "public, max-age=31536000")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upstream { status, body });
        }

        Ok(format!("{}/{}/{}", self.public_base, self.bucket, path))
    }
}

/// No bucket configured: hand the image back as a `data:` URL.
///
/// Inline URLs are returned to the client but never written to records.
#[derive(Debug, Default, Clone)]
pub struct InlineStorage;

#[async_trait]
impl ObjectStorage for InlineStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        _path: &str,
    ) -> Result<String, StorageError> {
        Ok(format!("data:{content_type};base64,{}", BASE64.encode(bytes)))
    }
}

pub fn is_inline_url(url: &str) -> bool {
    url.starts_with("data:")
}

/// URL safe to persist on a record, or `None` for inline data.
pub fn persistable_url(url: &str) -> Option<String> {
    if is_inline_url(url) {
        None
    } else {
        Some(url.to_string())
    }
}

pub fn card_image_path(card_id: &str, kind: &str) -> String {
    format!("cards/{card_id}/{kind}.png")
}
