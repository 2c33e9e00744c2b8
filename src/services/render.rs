//! Generate-then-upload, shared by every endpoint that produces an image.

use axum::http::StatusCode;

use crate::error::AppError;
use crate::services::imagen::{ImageGenError, ImageGenerator};
use crate::services::storage::{ObjectStorage, StorageError};

/// User-facing text for a safety-filter rejection.
pub const FILTERED_MESSAGE: &str =
    "画像がセーフティフィルタにより生成できませんでした。表現を少し変えてもう一度お試しください。";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Image(#[from] ImageGenError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RenderError {
    pub fn is_filtered(&self) -> bool {
        matches!(self, RenderError::Image(ImageGenError::Filtered(_)))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RenderError::Image(ImageGenError::RateLimited(_)))
    }

    /// Hard failure under `code`; upstream rate limiting keeps its 429 so clients retry.
    pub fn into_app_error(self, code: &'static str) -> AppError {
        let status = if self.is_rate_limited() {
            StatusCode::TOO_MANY_REQUESTS
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        AppError::Failed {
            code,
            status,
            message: self.to_string(),
        }
    }
}

/// Generate one image for `prompt` and store it at `path`, returning its URL.
pub async fn render_image(
    generator: &dyn ImageGenerator,
    storage: &dyn ObjectStorage,
    prompt: &str,
    path: &str,
) -> Result<String, RenderError> {
    let image = generator.generate(prompt).await?;
    let size = image.bytes.len();
    let url = storage.upload(image.bytes, &image.mime_type, path).await?;
    tracing::debug!(path = %path, bytes = size, "Image stored");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_maps_to_429() {
        let err = RenderError::Image(ImageGenError::RateLimited("429 quota".into()));
        assert!(err.is_rate_limited());
        let app = err.into_app_error("image_generation_failed");
        assert_eq!(app.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(app.code(), "image_generation_failed");
    }

    #[test]
    fn test_other_failures_map_to_500() {
        let err = RenderError::Storage(StorageError::Upstream {
            status: 403,
            body: "denied".into(),
        });
        assert!(!err.is_filtered());
        assert_eq!(
            err.into_app_error("task_image_failed").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
