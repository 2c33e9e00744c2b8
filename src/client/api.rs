use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dto::ImageKind;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not obtain auth token: {0}")]
    Token(String),
}

/// Body of a `POST /api/images` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePayload {
    pub card_id: String,
    pub user_id: String,
    pub kind: ImageKind,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_index: Option<u8>,
}

/// What came back from the server, success or not.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageReply {
    #[serde(skip)]
    pub http_status: u16,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ImageReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }

    /// Best human-readable explanation the server gave.
    pub fn text(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "画像を生成できませんでした".to_string())
    }
}

/// Bearer tokens for the API; `force_refresh` bypasses any cache.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self, force_refresh: bool) -> Result<Option<String>, ClientError>;
}

/// Fixed token (or none, for anonymous use).
pub struct StaticToken(pub Option<String>);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self, _force_refresh: bool) -> Result<Option<String>, ClientError> {
        Ok(self.0.clone())
    }
}

/// The two server calls the draw workflow makes.
#[async_trait]
pub trait ImageApi: Send + Sync {
    async fn post_image(
        &self,
        payload: &ImagePayload,
        force_refresh: bool,
    ) -> Result<ImageReply, ClientError>;

    async fn select_image(
        &self,
        card_id: &str,
        user_id: &str,
        image_url: &str,
    ) -> Result<(), ClientError>;
}

pub struct HttpImageApi {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpImageApi {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenSource>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    async fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        force_refresh: bool,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        Ok(match self.tokens.token(force_refresh).await? {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }
}

#[async_trait]
impl ImageApi for HttpImageApi {
    async fn post_image(
        &self,
        payload: &ImagePayload,
        force_refresh: bool,
    ) -> Result<ImageReply, ClientError> {
        let request = self
            .http
            .post(format!("{}/api/images", self.base_url))
            .json(payload);
        let response = self.authorized(request, force_refresh).await?.send().await?;

        let http_status = response.status().as_u16();
        // Non-JSON bodies (proxies, gateways) still yield a usable status.
        let mut reply: ImageReply = response.json().await.unwrap_or_default();
        reply.http_status = http_status;
        Ok(reply)
    }

    async fn select_image(
        &self,
        card_id: &str,
        user_id: &str,
        image_url: &str,
    ) -> Result<(), ClientError> {
        let request = self
            .http
            .post(format!("{}/api/select-image", self.base_url))
            .json(&serde_json::json!({
                "card_id": card_id,
                "user_id": user_id,
                "image_url": image_url,
            }));
        self.authorized(request, false)
            .await?
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
