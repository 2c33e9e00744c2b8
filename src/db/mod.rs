pub mod memory;
pub mod pool;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Store, StoreError, StoreResult};

use crate::error::{AppError, AppResult};
use crate::models::card::CardRecord;
use crate::models::task::CalendarTask;

/// Load a card for a mutation by `user_id`.
///
/// Missing → `not_found`; owned by someone else → `forbidden`. Store failures are
/// reported under `failure_code`.
pub async fn owned_card(
    store: &dyn Store,
    card_id: &str,
    user_id: &str,
    failure_code: &'static str,
) -> AppResult<CardRecord> {
    let card = store
        .get_card(card_id)
        .await
        .map_err(|e| AppError::failed(failure_code, e))?
        .ok_or(AppError::NotFound("card"))?;

    if card.user_id != user_id {
        tracing::warn!(card_id = %card_id, user_id = %user_id, "Card ownership mismatch");
        return Err(AppError::Forbidden);
    }
    Ok(card)
}

pub async fn owned_task(
    store: &dyn Store,
    task_id: &str,
    user_id: &str,
    failure_code: &'static str,
) -> AppResult<CalendarTask> {
    let task = store
        .get_task(task_id)
        .await
        .map_err(|e| AppError::failed(failure_code, e))?
        .ok_or(AppError::NotFound("task"))?;

    if task.user_id != user_id {
        tracing::warn!(task_id = %task_id, user_id = %user_id, "Task ownership mismatch");
        return Err(AppError::Forbidden);
    }
    Ok(task)
}
