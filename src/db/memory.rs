use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::store::{Store, StoreResult};
use crate::models::card::{CardPatch, CardRecord};
use crate::models::self_image::SelfImageRecord;
use crate::models::task::{CalendarTask, TaskPatch};

/// Process-local store used when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    cards: RwLock<HashMap<String, CardRecord>>,
    tasks: RwLock<HashMap<String, CalendarTask>>,
    self_images: RwLock<Vec<SelfImageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut cards: Vec<CardRecord>, limit: usize) -> Vec<CardRecord> {
    cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    cards.truncate(limit);
    cards
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_card(&self, card: &CardRecord) -> StoreResult<()> {
        self.cards
            .write()
            .await
            .insert(card.card_id.clone(), card.clone());
        Ok(())
    }

    async fn get_card(&self, card_id: &str) -> StoreResult<Option<CardRecord>> {
        Ok(self.cards.read().await.get(card_id).cloned())
    }

    async fn update_card(&self, card_id: &str, patch: CardPatch) -> StoreResult<()> {
        if let Some(card) = self.cards.write().await.get_mut(card_id) {
            patch.apply(card);
        }
        Ok(())
    }

    async fn list_cards_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<CardRecord>> {
        let cards = self
            .cards
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(cards, limit))
    }

    async fn list_recent_cards(&self, limit: usize) -> StoreResult<Vec<CardRecord>> {
        let cards = self.cards.read().await.values().cloned().collect();
        Ok(newest_first(cards, limit))
    }

    async fn list_scheduled_cards(&self, user_id: &str) -> StoreResult<Vec<CardRecord>> {
        let cards = self
            .cards
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id && c.action.scheduled_date.is_some())
            .cloned()
            .collect();
        Ok(newest_first(cards, usize::MAX))
    }

    async fn insert_task(&self, task: &CalendarTask) -> StoreResult<()> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> StoreResult<Option<CalendarTask>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn update_task(&self, task_id: &str, patch: TaskPatch) -> StoreResult<()> {
        if let Some(task) = self.tasks.write().await.get_mut(task_id) {
            patch.apply(task);
        }
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> StoreResult<()> {
        self.tasks.write().await.remove(task_id);
        Ok(())
    }

    async fn list_tasks(&self, user_id: &str) -> StoreResult<Vec<CalendarTask>> {
        let mut tasks: Vec<CalendarTask> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn insert_self_image(&self, record: &SelfImageRecord) -> StoreResult<()> {
        self.self_images.write().await.push(record.clone());
        Ok(())
    }

    async fn latest_self_image(&self, user_id: &str) -> StoreResult<Option<SelfImageRecord>> {
        Ok(self
            .self_images
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }
}
