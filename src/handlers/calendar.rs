use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::auth::middleware::Requester;
use crate::dto::{CalendarQuery, CalendarResponse};
use crate::error::{AppError, AppResult};
use crate::services::calendar::{merge_month, MonthRange};
use crate::AppState;

pub async fn get_calendar(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Query(query): Query<CalendarQuery>,
) -> AppResult<Json<CalendarResponse>> {
    let user_id = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("user_id is required"))?;
    let month = query
        .month
        .as_deref()
        .ok_or_else(|| AppError::validation("month is required"))?;
    let range = MonthRange::parse(month)?;
    requester.authorize(user_id)?;

    let (cards, tasks) = tokio::try_join!(
        state.store.list_scheduled_cards(user_id),
        state.store.list_tasks(user_id)
    )
    .map_err(|e| AppError::failed("calendar_failed", e))?;

    let items = merge_month(&cards, &tasks, &range);
    tracing::debug!(user_id = %user_id, month = %month, items = items.len(), "Calendar built");

    Ok(Json(CalendarResponse { items }))
}
