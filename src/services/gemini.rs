use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum TextGenError {
    #[error("Gemini API error: {status} {body}")]
    Upstream { status: u16, body: String },

    #[error("Gemini response missing text: {0}")]
    EmptyResponse(String),

    #[error("No JSON object found in Gemini response")]
    NoJson,

    #[error("Gemini returned invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Gemini request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Upstream text generation: prompt in, loosely-shaped JSON out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_json(&self, prompt: &str) -> Result<Value, TextGenError>;
}

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.google_api_base.trim_end_matches('/'),
                config.gemini_model
            ),
            api_key: config.google_api_key.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_json(&self, prompt: &str) -> Result<Value, TextGenError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": prompt }]
                }],
                "generationConfig": {
                    "temperature": 0.7,
                    "maxOutputTokens": 2048,
                    "responseMimeType": "application/json",
                    "thinkingConfig": { "thinkingBudget": 0 }
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TextGenError::Upstream { status, body });
        }

        let payload: Value = response.json().await?;
        let text = response_text(&payload);
        if text.is_empty() {
            return Err(TextGenError::EmptyResponse(payload.to_string()));
        }

        Ok(serde_json::from_str(extract_json(&text)?)?)
    }
}

/// Concatenate the text parts of the first candidate.
pub fn response_text(payload: &Value) -> String {
    payload["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// The span from the first `{` to the last `}`; models like to wrap JSON in prose.
pub fn extract_json(text: &str) -> Result<&str, TextGenError> {
    match (text.find('{'), text.rfind('}')) {
        (Some(first), Some(last)) if last > first => Ok(&text[first..=last]),
        _ => Err(TextGenError::NoJson),
    }
}
