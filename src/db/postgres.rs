use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::db::store::{Store, StoreResult};
use crate::models::card::{
    ActionPlan, CardPatch, CardRecord, CardStatus, ImageStatus, NegativeCard, PositiveCard,
};
use crate::models::self_image::SelfImageRecord;
use crate::models::task::{CalendarTask, TaskPatch};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Card sections live in JSONB columns.
#[derive(Debug, FromRow)]
struct CardRow {
    card_id: String,
    user_id: String,
    anxiety_text: String,
    negative: Json<NegativeCard>,
    positive: Json<PositiveCard>,
    action: Json<ActionPlan>,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    image_status: ImageStatus,
    image_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CardRow> for CardRecord {
    fn from(row: CardRow) -> Self {
        CardRecord {
            card_id: row.card_id,
            user_id: row.user_id,
            anxiety_text: row.anxiety_text,
            negative: row.negative.0,
            positive: row.positive.0,
            action: row.action.0,
            status: CardStatus {
                completed: row.completed,
                completed_at: row.completed_at,
            },
            image_status: row.image_status,
            image_error: row.image_error,
            created_at: row.created_at,
        }
    }
}

const CARD_COLUMNS: &str = "card_id, user_id, anxiety_text, negative, positive, action, \
     completed, completed_at, image_status, image_error, created_at";

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_card(&self, card: &CardRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cards (card_id, user_id, anxiety_text, negative, positive, action,
                               completed, completed_at, image_status, image_error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&card.card_id)
        .bind(&card.user_id)
        .bind(&card.anxiety_text)
        .bind(Json(&card.negative))
        .bind(Json(&card.positive))
        .bind(Json(&card.action))
        .bind(card.status.completed)
        .bind(card.status.completed_at)
        .bind(card.image_status)
        .bind(&card.image_error)
        .bind(card.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_card(&self, card_id: &str) -> StoreResult<Option<CardRecord>> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE card_id = $1"
        ))
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CardRecord::from))
    }

    async fn update_card(&self, card_id: &str, patch: CardPatch) -> StoreResult<()> {
        let (set_error, image_error) = match patch.image_error {
            Some(error) => (true, error),
            None => (false, None),
        };
        let (set_schedule, scheduled_date) = match patch.scheduled_date {
            Some(date) => (true, date),
            None => (false, None),
        };
        let set_checklist = patch.checklist.is_some();
        let checklist = patch.checklist.unwrap_or_default();
        let completed = patch.status.as_ref().map(|s| s.completed);
        let completed_at = patch.status.and_then(|s| s.completed_at);

        // Action fields are merged key by key so concurrent edits of other keys survive.
        sqlx::query(
            r#"
            UPDATE cards SET
                negative = CASE WHEN $2::text IS NULL THEN negative
                                ELSE jsonb_set(negative, '{image_url}', to_jsonb($2::text)) END,
                positive = CASE WHEN $3::text IS NULL THEN positive
                                ELSE jsonb_set(positive, '{image_url}', to_jsonb($3::text)) END,
                image_status = COALESCE($4, image_status),
                image_error = CASE WHEN $5 THEN $6 ELSE image_error END,
                action = action
                    || CASE WHEN $7::text IS NULL THEN '{}'::jsonb
                            ELSE jsonb_build_object('title', $7::text) END
                    || CASE WHEN $8::text IS NULL THEN '{}'::jsonb
                            ELSE jsonb_build_object('reason', $8::text) END
                    || CASE WHEN $9::int4 IS NULL THEN '{}'::jsonb
                            ELSE jsonb_build_object('minutes', $9::int4) END
                    || CASE WHEN $10 THEN jsonb_build_object('scheduled_date', $11::text)
                            ELSE '{}'::jsonb END
                    || CASE WHEN $12 THEN jsonb_build_object(
                                'checklist_done', $13::boolean,
                                'checklist_done_at', $14::timestamptz)
                            ELSE '{}'::jsonb END,
                anxiety_text = COALESCE($15, anxiety_text),
                completed = COALESCE($16, completed),
                completed_at = CASE WHEN $16 IS NULL THEN completed_at ELSE $17 END
            WHERE card_id = $1
            "#,
        )
        .bind(card_id)
        .bind(&patch.negative_image_url)
        .bind(&patch.positive_image_url)
        .bind(patch.image_status)
        .bind(set_error)
        .bind(image_error)
        .bind(&patch.action_title)
        .bind(&patch.action_reason)
        .bind(patch.action_minutes.map(|m| m as i32))
        .bind(set_schedule)
        .bind(scheduled_date)
        .bind(set_checklist)
        .bind(checklist.done)
        .bind(checklist.done_at)
        .bind(&patch.anxiety_text)
        .bind(completed)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_cards_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<CardRecord>> {
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CardRecord::from).collect())
    }

    async fn list_recent_cards(&self, limit: usize) -> StoreResult<Vec<CardRecord>> {
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CardRecord::from).collect())
    }

    async fn list_scheduled_cards(&self, user_id: &str) -> StoreResult<Vec<CardRecord>> {
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            r#"
            SELECT {CARD_COLUMNS} FROM cards
            WHERE user_id = $1 AND action->>'scheduled_date' IS NOT NULL
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CardRecord::from).collect())
    }

    async fn insert_task(&self, task: &CalendarTask) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO calendar_tasks (id, user_id, scheduled_date, action_title, action_detail,
                                        anxiety_text, negative_image_url, positive_image_url,
                                        checklist_done, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&task.id)
        .bind(&task.user_id)
        .bind(&task.scheduled_date)
        .bind(&task.action_title)
        .bind(&task.action_detail)
        .bind(&task.anxiety_text)
        .bind(&task.negative_image_url)
        .bind(&task.positive_image_url)
        .bind(task.checklist_done)
        .bind(task.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> StoreResult<Option<CalendarTask>> {
        let task = sqlx::query_as::<_, CalendarTask>("SELECT * FROM calendar_tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn update_task(&self, task_id: &str, patch: TaskPatch) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE calendar_tasks SET
                action_title = COALESCE($2, action_title),
                action_detail = COALESCE($3, action_detail),
                anxiety_text = COALESCE($4, anxiety_text),
                checklist_done = COALESCE($5, checklist_done),
                negative_image_url = COALESCE($6, negative_image_url),
                positive_image_url = COALESCE($7, positive_image_url)
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .bind(&patch.action_title)
        .bind(&patch.action_detail)
        .bind(&patch.anxiety_text)
        .bind(patch.checklist_done)
        .bind(&patch.negative_image_url)
        .bind(&patch.positive_image_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM calendar_tasks WHERE id = $1")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_tasks(&self, user_id: &str) -> StoreResult<Vec<CalendarTask>> {
        let tasks = sqlx::query_as::<_, CalendarTask>(
            "SELECT * FROM calendar_tasks WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn insert_self_image(&self, record: &SelfImageRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO self_images (id, user_id, image_url, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.image_url)
        .bind(&record.description)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_self_image(&self, user_id: &str) -> StoreResult<Option<SelfImageRecord>> {
        let record = sqlx::query_as::<_, SelfImageRecord>(
            r#"
            SELECT * FROM self_images
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}
