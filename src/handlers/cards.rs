use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::auth::middleware::Requester;
use crate::db::{owned_card, owned_task};
use crate::dto::{
    ChecklistRequest, ChecklistResponse, CompleteRequest, CompleteResponse, ItemRef,
    RegisterRequest, RegisterResponse, SelectImageRequest, SelectImageResponse, ValidatedExt,
};
use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::models::card::{CardPatch, CardStatus, ChecklistState, ImageStatus};
use crate::models::task::TaskPatch;
use crate::services::calendar::parse_scheduled_date;
use crate::services::storage::persistable_url;
use crate::AppState;

/// Promote a chosen candidate to the card's negative image.
pub async fn select_image(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<SelectImageRequest>,
) -> AppResult<Json<SelectImageResponse>> {
    let req = req.validated()?;
    requester.authorize(&req.user_id)?;

    owned_card(state.store.as_ref(), &req.card_id, &req.user_id, "select_failed").await?;

    let patch = CardPatch {
        negative_image_url: persistable_url(&req.image_url),
        image_status: Some(ImageStatus::Selected),
        ..Default::default()
    };
    state
        .store
        .update_card(&req.card_id, patch)
        .await
        .map_err(|e| AppError::failed("select_failed", e))?;

    tracing::info!(card_id = %req.card_id, "Candidate selected");

    Ok(Json(SelectImageResponse {
        status: "selected",
        image_url: req.image_url,
    }))
}

/// Put the card's action on the calendar and reset its checklist state.
pub async fn register(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    let req = req.validated()?;
    requester.authorize(&req.user_id)?;
    let scheduled_date = parse_scheduled_date(&req.scheduled_date)?;

    owned_card(state.store.as_ref(), &req.card_id, &req.user_id, "register_failed").await?;

    state
        .store
        .update_card(
            &req.card_id,
            CardPatch {
                action_title: Some(req.action_title.trim().to_string()),
                action_reason: Some(req.action_reason.trim().to_string()),
                action_minutes: req.action_minutes,
                scheduled_date: Some(Some(scheduled_date.clone())),
                checklist: Some(ChecklistState::reset()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| AppError::failed("register_failed", e))?;

    tracing::info!(card_id = %req.card_id, scheduled_date = %scheduled_date, "Action registered");

    Ok(Json(RegisterResponse {
        status: "registered",
        scheduled_date,
    }))
}

/// Toggle today's action on either a card or a task.
pub async fn checklist(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<ChecklistRequest>,
) -> AppResult<Json<ChecklistResponse>> {
    let req = req.validated()?;
    let item = ItemRef::from_exactly_one(req.card_id.as_deref(), req.task_id.as_deref())?;
    let Some(done) = req.done else {
        return Err(AppError::validation("done is required"));
    };
    requester.authorize(&req.user_id)?;

    let store = state.store.as_ref();
    match &item {
        ItemRef::Card(card_id) => {
            owned_card(store, card_id, &req.user_id, "checklist_failed").await?;
            store
                .update_card(
                    card_id,
                    CardPatch {
                        checklist: Some(ChecklistState::marked(done, Utc::now())),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| AppError::failed("checklist_failed", e))?;
        }
        ItemRef::Task(task_id) => {
            owned_task(store, task_id, &req.user_id, "checklist_failed").await?;
            store
                .update_task(
                    task_id,
                    TaskPatch {
                        checklist_done: Some(done),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| AppError::failed("checklist_failed", e))?;
        }
    }

    tracing::info!(item = ?item, done = done, "Checklist updated");

    Ok(Json(ChecklistResponse { status: "ok", done }))
}

/// Close the card's reflection cycle. One-way; repeating returns the first timestamp.
pub async fn complete(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<CompleteRequest>,
) -> AppResult<Json<CompleteResponse>> {
    let req = req.validated()?;
    requester.authorize(&req.user_id)?;

    let card = owned_card(state.store.as_ref(), &req.card_id, &req.user_id, "complete_failed").await?;
    if card.status.completed {
        return Ok(Json(CompleteResponse {
            status: card.status,
        }));
    }

    let status = CardStatus {
        completed: true,
        completed_at: Some(Utc::now()),
    };
    state
        .store
        .update_card(
            &req.card_id,
            CardPatch {
                status: Some(status.clone()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| AppError::failed("complete_failed", e))?;

    tracing::info!(card_id = %req.card_id, "Card completed");

    Ok(Json(CompleteResponse { status }))
}
