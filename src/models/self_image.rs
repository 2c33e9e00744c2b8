use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only snapshot; only the latest row per user is ever read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SelfImageRecord {
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
