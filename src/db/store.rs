use async_trait::async_trait;

use crate::models::card::{CardPatch, CardRecord};
use crate::models::self_image::SelfImageRecord;
use crate::models::task::{CalendarTask, TaskPatch};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document-style persistence for cards, calendar tasks and self images.
///
/// Updates are narrow patches; there is no cross-request locking and the last write
/// wins. Ownership is checked by callers (see [`super::owned_card`]).
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn insert_card(&self, card: &CardRecord) -> StoreResult<()>;
    async fn get_card(&self, card_id: &str) -> StoreResult<Option<CardRecord>>;
    async fn update_card(&self, card_id: &str, patch: CardPatch) -> StoreResult<()>;
    /// Newest first.
    async fn list_cards_for_user(&self, user_id: &str, limit: usize)
        -> StoreResult<Vec<CardRecord>>;
    /// Newest first, across all users.
    async fn list_recent_cards(&self, limit: usize) -> StoreResult<Vec<CardRecord>>;
    /// Cards of `user_id` whose action carries a scheduled date.
    async fn list_scheduled_cards(&self, user_id: &str) -> StoreResult<Vec<CardRecord>>;

    async fn insert_task(&self, task: &CalendarTask) -> StoreResult<()>;
    async fn get_task(&self, task_id: &str) -> StoreResult<Option<CalendarTask>>;
    async fn update_task(&self, task_id: &str, patch: TaskPatch) -> StoreResult<()>;
    async fn delete_task(&self, task_id: &str) -> StoreResult<()>;
    async fn list_tasks(&self, user_id: &str) -> StoreResult<Vec<CalendarTask>>;

    async fn insert_self_image(&self, record: &SelfImageRecord) -> StoreResult<()>;
    async fn latest_self_image(&self, user_id: &str) -> StoreResult<Option<SelfImageRecord>>;
}
