use axum::{extract::State, Extension, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::middleware::Requester;
use crate::db::{owned_card, owned_task};
use crate::dto::{
    CalendarTaskRequest, CalendarTaskResponse, ImageResponse, ItemRef, OkResponse, SideKind,
    TaskDeleteRequest, TaskImageRequest, TaskUpdateRequest, ValidatedExt,
};
use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::models::card::{CardPatch, ChecklistState};
use crate::models::task::{CalendarTask, TaskPatch};
use crate::services::calendar::parse_scheduled_date;
use crate::services::prompts::{task_prompt, PromptSide};
use crate::services::render::{render_image, FILTERED_MESSAGE};
use crate::services::storage::persistable_url;
use crate::AppState;

/// Add a cardless entry to the calendar.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<CalendarTaskRequest>,
) -> AppResult<Json<CalendarTaskResponse>> {
    let req = req.validated()?;
    requester.authorize(&req.user_id)?;
    let scheduled_date = parse_scheduled_date(&req.scheduled_date)?;

    let task = CalendarTask {
        id: Uuid::new_v4().to_string(),
        user_id: req.user_id,
        scheduled_date,
        action_title: req.action_title.trim().to_string(),
        action_detail: String::new(),
        anxiety_text: String::new(),
        negative_image_url: None,
        positive_image_url: None,
        checklist_done: false,
        created_at: Utc::now(),
    };

    state
        .store
        .insert_task(&task)
        .await
        .map_err(|e| AppError::failed("task_create_failed", e))?;

    tracing::info!(task_id = %task.id, user_id = %task.user_id, "Calendar task created");

    Ok(Json(CalendarTaskResponse {
        status: "created",
        task_id: task.id,
    }))
}

/// Edit the calendar text of a card or task.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<TaskUpdateRequest>,
) -> AppResult<Json<OkResponse>> {
    let req = req.validated()?;
    let item = ItemRef::from_kind(req.kind, req.card_id.as_deref(), req.task_id.as_deref())?;
    requester.authorize(&req.user_id)?;

    let store = state.store.as_ref();
    let title = req.action_title.trim().to_string();
    let detail = req.action_detail.trim().to_string();
    let anxiety_text = req.anxiety_text.trim().to_string();

    match &item {
        ItemRef::Card(card_id) => {
            owned_card(store, card_id, &req.user_id, "task_update_failed").await?;
            store
                .update_card(
                    card_id,
                    CardPatch {
                        action_title: Some(title),
                        action_reason: Some(detail),
                        anxiety_text: Some(anxiety_text),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| AppError::failed("task_update_failed", e))?;
        }
        ItemRef::Task(task_id) => {
            owned_task(store, task_id, &req.user_id, "task_update_failed").await?;
            store
                .update_task(
                    task_id,
                    TaskPatch {
                        action_title: Some(title),
                        action_detail: Some(detail),
                        anxiety_text: Some(anxiety_text),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| AppError::failed("task_update_failed", e))?;
        }
    }

    tracing::info!(item = ?item, "Calendar entry updated");
    Ok(Json(OkResponse { status: "ok" }))
}

/// Remove an entry from the calendar.
///
/// Cards survive with their schedule cleared; tasks are deleted.
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<TaskDeleteRequest>,
) -> AppResult<Json<OkResponse>> {
    let req = req.validated()?;
    let item = ItemRef::from_kind(req.kind, req.card_id.as_deref(), req.task_id.as_deref())?;
    requester.authorize(&req.user_id)?;

    let store = state.store.as_ref();
    match &item {
        ItemRef::Card(card_id) => {
            owned_card(store, card_id, &req.user_id, "task_delete_failed").await?;
            store
                .update_card(
                    card_id,
                    CardPatch {
                        scheduled_date: Some(None),
                        checklist: Some(ChecklistState::cleared()),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| AppError::failed("task_delete_failed", e))?;
        }
        ItemRef::Task(task_id) => {
            owned_task(store, task_id, &req.user_id, "task_delete_failed").await?;
            store
                .delete_task(task_id)
                .await
                .map_err(|e| AppError::failed("task_delete_failed", e))?;
        }
    }

    tracing::info!(item = ?item, "Calendar entry removed");
    Ok(Json(OkResponse { status: "ok" }))
}

/// Illustrate a task from the user's own words.
pub async fn task_image(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    JsonBody(req): JsonBody<TaskImageRequest>,
) -> AppResult<Json<ImageResponse>> {
    let req = req.validated()?;
    let Some(side) = req.kind else {
        return Err(AppError::validation("kind is required"));
    };
    requester.authorize(&req.user_id)?;

    if state.config.mock_generation {
        return Ok(Json(ImageResponse::status("mock")));
    }

    owned_task(state.store.as_ref(), &req.task_id, &req.user_id, "task_image_failed").await?;

    let prompt_side = match side {
        SideKind::Negative => PromptSide::Negative,
        SideKind::Positive => PromptSide::Positive,
    };
    let prompt = task_prompt(prompt_side, &req.anxiety_text);
    let path = format!("cards/{}/task-{}.png", req.task_id, side.as_str());

    let url = match render_image(
        state.image_gen.as_ref(),
        state.storage.as_ref(),
        &prompt,
        &path,
    )
    .await
    {
        Ok(url) => url,
        Err(err) if err.is_filtered() => {
            tracing::warn!(task_id = %req.task_id, error = %err, "Task image filtered");
            return Ok(Json(ImageResponse {
                message: Some(FILTERED_MESSAGE.into()),
                ..ImageResponse::status("filtered")
            }));
        }
        Err(err) => {
            tracing::error!(task_id = %req.task_id, error = %err, "Task image failed");
            return Err(err.into_app_error("task_image_failed"));
        }
    };

    let mut patch = TaskPatch::default();
    match side {
        SideKind::Negative => patch.negative_image_url = persistable_url(&url),
        SideKind::Positive => patch.positive_image_url = persistable_url(&url),
    }
    state
        .store
        .update_task(&req.task_id, patch)
        .await
        .map_err(|e| AppError::failed("task_image_failed", e))?;

    tracing::info!(task_id = %req.task_id, side = side.as_str(), "Task image ready");

    Ok(Json(ImageResponse {
        image_url: Some(url),
        ..ImageResponse::status("ok")
    }))
}
