use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::middleware::Requester;
use crate::dto::{SelfImageQuery, SelfImageRequest, SelfImageResponse, ValidatedExt};
use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::models::card::CardRecord;
use crate::models::self_image::SelfImageRecord;
use crate::services::normalize::normalize_self_image;
use crate::services::prompts::self_image_prompt;
use crate::services::render::render_image;
use crate::services::storage::persistable_url;
use crate::AppState;

const FAILURE_CODE: &str = "self_image_failed";
const SUMMARY_CARDS: usize = 20;

/// Summarize the user's recent cards into one illustrated self-state.
pub async fn create_self_image(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<SelfImageRequest>,
) -> AppResult<Json<SelfImageResponse>> {
    let req = req.validated()?;
    requester.require(&req.user_id)?;

    let cards = state
        .store
        .list_cards_for_user(&req.user_id, SUMMARY_CARDS)
        .await
        .map_err(|e| AppError::failed(FAILURE_CODE, e))?;
    if cards.is_empty() {
        return Err(AppError::BadRequest {
            code: "no_history",
            message: "no cards to summarize yet".into(),
        });
    }

    let raw = state
        .text_gen
        .generate_json(&self_image_prompt(&summarize(&cards)))
        .await
        .map_err(|e| AppError::failed(FAILURE_CODE, e))?;
    let prompt = normalize_self_image(&raw).map_err(|e| AppError::failed(FAILURE_CODE, e))?;

    let now = Utc::now();
    let path = format!(
        "cards/self-{}-{}/self-state.png",
        req.user_id,
        now.timestamp_millis()
    );
    let image_url = render_image(
        state.image_gen.as_ref(),
        state.storage.as_ref(),
        &prompt.image_prompt,
        &path,
    )
    .await
    .map_err(|e| {
        tracing::error!(user_id = %req.user_id, error = %e, "Self image failed");
        e.into_app_error(FAILURE_CODE)
    })?;

    match persistable_url(&image_url) {
        Some(url) => {
            let record = SelfImageRecord {
                id: Uuid::new_v4().to_string(),
                user_id: req.user_id.clone(),
                image_url: url,
                description: prompt.description.clone(),
                created_at: now,
            };
            state
                .store
                .insert_self_image(&record)
                .await
                .map_err(|e| AppError::failed(FAILURE_CODE, e))?;
        }
        None => tracing::debug!(user_id = %req.user_id, "Inline self image not recorded"),
    }

    tracing::info!(user_id = %req.user_id, cards = cards.len(), "Self image generated");

    Ok(Json(SelfImageResponse {
        image_url: Some(image_url),
        description: Some(prompt.description),
        created_at: Some(now),
    }))
}

pub async fn get_self_image(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Query(query): Query<SelfImageQuery>,
) -> AppResult<Json<SelfImageResponse>> {
    let user_id = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("user_id is required"))?;
    requester.require(user_id)?;

    let latest = state
        .store
        .latest_self_image(user_id)
        .await
        .map_err(|e| AppError::failed(FAILURE_CODE, e))?;

    Ok(Json(match latest {
        Some(record) => SelfImageResponse {
            image_url: Some(record.image_url),
            description: Some(record.description),
            created_at: Some(record.created_at),
        },
        None => SelfImageResponse {
            image_url: None,
            description: None,
            created_at: None,
        },
    }))
}

/// One line per card, newest first.
fn summarize(cards: &[CardRecord]) -> String {
    cards
        .iter()
        .map(|card| {
            format!(
                "- anxiety: {} / emotion: {} / theme: {} / action: {} ({})",
                card.anxiety_text.trim(),
                card.negative.emotion,
                card.positive.theme,
                card.action.title,
                card.action.reason
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
