use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::config::Config;
use crate::services::prompts::ASPECT_RATIO;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageGenError {
    /// The upstream safety filter rejected the prompt or the output.
    #[error("Imagen response filtered: raiFilteredReason={0}")]
    Filtered(String),

    #[error("Imagen rate limited: {0}")]
    RateLimited(String),

    #[error("Imagen API error: {status} {body}")]
    Upstream { status: u16, body: String },

    #[error("Imagen response missing image bytes: {0}")]
    MissingBytes(String),

    #[error("Imagen image base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Imagen request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ImageGenError>;
}

pub struct ImagenClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ImagenClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/models/{}:predict",
                config.google_api_base.trim_end_matches('/'),
                config.imagen_model
            ),
            api_key: config.google_api_key.clone(),
        })
    }
}

#[async_trait]
impl ImageGenerator for ImagenClient {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ImageGenError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "instances": [{ "prompt": prompt }],
                "parameters": {
                    "sampleCount": 1,
                    "aspectRatio": ASPECT_RATIO,
                    "personGeneration": "allow_adult",
                    "includeRaiReason": true,
                    "outputOptions": { "mimeType": "image/png" }
                }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || body.contains("RESOURCE_EXHAUSTED") {
                return Err(ImageGenError::RateLimited(format!("429 {body}")));
            }
            return Err(ImageGenError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        extract_prediction(&payload)
    }
}

/// Pull the first image out of a `:predict` response.
pub fn extract_prediction(payload: &Value) -> Result<GeneratedImage, ImageGenError> {
    let prediction = &payload["predictions"][0];

    if let Some(encoded) = prediction["bytesBase64Encoded"].as_str() {
        let bytes = BASE64.decode(encoded.as_bytes())?;
        return Ok(GeneratedImage {
            bytes,
            mime_type: prediction["mimeType"]
                .as_str()
                .unwrap_or("image/png")
                .to_string(),
        });
    }

    if let Some(reason) = prediction["raiFilteredReason"].as_str() {
        return Err(ImageGenError::Filtered(reason.to_string()));
    }

    Err(ImageGenError::MissingBytes(payload.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prediction_decodes_bytes() {
        let payload = json!({
            "predictions": [{ "bytesBase64Encoded": BASE64.encode(b"png"), "mimeType": "image/png" }]
        });
        let image = extract_prediction(&payload).unwrap();
        assert_eq!(image.bytes, b"png");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn test_extract_prediction_filtered() {
        let payload = json!({ "predictions": [{ "raiFilteredReason": "violence" }] });
        match extract_prediction(&payload) {
            Err(ImageGenError::Filtered(reason)) => assert_eq!(reason, "violence"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_extract_prediction_empty() {
        assert!(matches!(
            extract_prediction(&json!({})),
            Err(ImageGenError::MissingBytes(_))
        ));
    }
}
