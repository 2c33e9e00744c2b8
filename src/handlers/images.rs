use axum::{extract::State, Extension, Json};

use crate::auth::middleware::Requester;
use crate::db::owned_card;
use crate::dto::{ImageKind, ImageRequest, ImageResponse, ValidatedExt};
use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::models::card::{CardPatch, ImageStatus};
use crate::services::render::{render_image, RenderError, FILTERED_MESSAGE};
use crate::services::storage::{card_image_path, persistable_url};
use crate::AppState;

const FAILURE_CODE: &str = "image_generation_failed";

/// Generate one card image.
///
/// Candidates are ephemeral and never touch the card; `negative`/`positive`
/// results (or their failure) are written back to it.
pub async fn generate_image(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<ImageRequest>,
) -> AppResult<Json<ImageResponse>> {
    let req = req.validated()?;
    requester.authorize(&req.user_id)?;
    let Some(kind) = req.kind else {
        return Err(AppError::validation("kind is required"));
    };

    if state.config.mock_generation {
        return Ok(Json(ImageResponse::status("mock")));
    }

    if let Some(index) = req.candidate_index {
        if kind == ImageKind::NegativeCandidate && index >= state.config.negative_candidates {
            return Err(AppError::validation(format!(
                "candidate_index must be below {}",
                state.config.negative_candidates
            )));
        }
    }

    // Candidates still require ownership.
    owned_card(state.store.as_ref(), &req.card_id, &req.user_id, FAILURE_CODE).await?;

    let response = match kind {
        ImageKind::NegativeCandidate => {
            let index = req.candidate_index.unwrap_or_default();
            generate_candidate(&state, &req, index).await?
        }
        ImageKind::Negative => generate_side(&state, &req, "negative").await?,
        ImageKind::Positive => generate_side(&state, &req, "positive").await?,
    };
    Ok(Json(response))
}

async fn generate_candidate(
    state: &AppState,
    req: &ImageRequest,
    index: u8,
) -> AppResult<ImageResponse> {
    let path = card_image_path(&req.card_id, &format!("negative-candidate-{index}"));
    let result = render_image(
        state.image_gen.as_ref(),
        state.storage.as_ref(),
        &req.prompt,
        &path,
    )
    .await;

    match result {
        Ok(url) => {
            tracing::info!(card_id = %req.card_id, candidate_index = index, "Candidate ready");
            Ok(ImageResponse {
                status: "candidate_ready".into(),
                image_url: Some(url),
                candidate_index: Some(index),
                message: None,
            })
        }
        Err(err) if err.is_filtered() => {
            tracing::warn!(card_id = %req.card_id, candidate_index = index, error = %err, "Candidate filtered");
            Ok(ImageResponse {
                status: "filtered".into(),
                image_url: None,
                candidate_index: Some(index),
                message: Some(FILTERED_MESSAGE.into()),
            })
        }
        Err(err) => {
            tracing::error!(card_id = %req.card_id, candidate_index = index, error = %err, "Candidate failed");
            Err(err.into_app_error(FAILURE_CODE))
        }
    }
}

async fn generate_side(
    state: &AppState,
    req: &ImageRequest,
    side: &'static str,
) -> AppResult<ImageResponse> {
    let path = card_image_path(&req.card_id, side);
    let result = render_image(
        state.image_gen.as_ref(),
        state.storage.as_ref(),
        &req.prompt,
        &path,
    )
    .await;

    match result {
        Ok(url) => {
            let (patch, status) = success_patch(side, &url);
            state
                .store
                .update_card(&req.card_id, patch)
                .await
                .map_err(|e| AppError::failed(FAILURE_CODE, e))?;
            tracing::info!(card_id = %req.card_id, side = side, "Card image ready");
            Ok(ImageResponse {
                status: status.into(),
                image_url: Some(url),
                candidate_index: None,
                message: None,
            })
        }
        Err(err) => {
            let filtered = err.is_filtered();
            record_failure(state, &req.card_id, &err).await;
            if filtered {
                tracing::warn!(card_id = %req.card_id, side = side, error = %err, "Card image filtered");
                return Ok(ImageResponse {
                    status: "filtered".into(),
                    image_url: None,
                    candidate_index: None,
                    message: Some(FILTERED_MESSAGE.into()),
                });
            }
            tracing::error!(card_id = %req.card_id, side = side, error = %err, "Card image failed");
            Err(err.into_app_error(FAILURE_CODE))
        }
    }
}

fn success_patch(side: &str, url: &str) -> (CardPatch, &'static str) {
    let mut patch = CardPatch {
        image_error: Some(None),
        ..Default::default()
    };
    let status = if side == "negative" {
        patch.negative_image_url = persistable_url(url);
        patch.image_status = Some(ImageStatus::Partial);
        "partial"
    } else {
        patch.positive_image_url = persistable_url(url);
        patch.image_status = Some(ImageStatus::Ready);
        "ready"
    };
    (patch, status)
}

/// Failures are recorded on the card so a later read reflects them.
async fn record_failure(state: &AppState, card_id: &str, err: &RenderError) {
    let status = if err.is_filtered() {
        ImageStatus::Filtered
    } else {
        ImageStatus::Error
    };
    let patch = CardPatch {
        image_status: Some(status),
        image_error: Some(Some(err.to_string())),
        ..Default::default()
    };
    if let Err(e) = state.store.update_card(card_id, patch).await {
        tracing::error!(card_id = %card_id, error = %e, "Failed to record image failure");
    }
}
