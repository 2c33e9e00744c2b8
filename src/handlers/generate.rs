use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::middleware::Requester;
use crate::dto::{GenerateRequest, GenerateResponse, ValidatedExt};
use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::models::card::{
    ActionPlan, CardRecord, CardStatus, ImageStatus, NegativeCard, PositiveCard,
};
use crate::services::mock::mock_card;
use crate::services::normalize::{normalize_reflection, NormalizedReflection};
use crate::services::prompts::reflection_prompt;
use crate::AppState;

const FAILURE_CODE: &str = "generation_failed";

/// Turn anxiety text into a persisted card (images come later).
pub async fn generate(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let req = req.validated()?;
    requester.authorize(&req.user_id)?;

    if state.config.mock_generation {
        tracing::debug!(user_id = %req.user_id, "Serving mock card");
        return Ok(Json(mock_card()));
    }

    let anxiety_text = req.anxiety_text.trim().to_string();
    let raw = state
        .text_gen
        .generate_json(&reflection_prompt(&anxiety_text))
        .await
        .map_err(|e| {
            tracing::error!(user_id = %req.user_id, error = %e, "Text generation failed");
            AppError::failed(FAILURE_CODE, "card generation failed")
        })?;

    let reflection = normalize_reflection(&raw).map_err(|e| {
        tracing::error!(user_id = %req.user_id, error = %e, "Generated output rejected");
        AppError::failed(FAILURE_CODE, "card generation failed")
    })?;

    let card = new_card(
        Uuid::new_v4().to_string(),
        req.user_id,
        anxiety_text,
        reflection,
        Utc::now(),
    );

    state
        .store
        .insert_card(&card)
        .await
        .map_err(|e| AppError::failed(FAILURE_CODE, e))?;

    tracing::info!(
        card_id = %card.card_id,
        user_id = %card.user_id,
        locale = req.locale.as_deref().unwrap_or("ja"),
        "Card generated"
    );

    Ok(Json(GenerateResponse::from(&card)))
}

fn new_card(
    card_id: String,
    user_id: String,
    anxiety_text: String,
    reflection: NormalizedReflection,
    now: DateTime<Utc>,
) -> CardRecord {
    let NormalizedReflection {
        negative,
        positive,
        action,
    } = reflection;

    CardRecord {
        card_id,
        user_id,
        anxiety_text,
        negative: NegativeCard {
            name: negative.name,
            keywords: negative.keywords,
            interpretation: negative.interpretation,
            emotion: negative.emotion,
            image_prompt: negative.image_prompt,
            image_url: None,
        },
        positive: PositiveCard {
            name: positive.name,
            keywords: positive.keywords,
            interpretation: positive.interpretation,
            theme: positive.theme,
            image_prompt: positive.image_prompt,
            image_url: None,
        },
        action: ActionPlan {
            title: action.title,
            minutes: action.minutes,
            reason: action.reason,
            scheduled_date: None,
            checklist_done: None,
            checklist_done_at: None,
            image_url: None,
        },
        status: CardStatus::default(),
        image_status: ImageStatus::Pending,
        image_error: None,
        created_at: now,
    }
}
