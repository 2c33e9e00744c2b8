use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cardless calendar entry created directly by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CalendarTask {
    pub id: String,
    pub user_id: String,
    pub scheduled_date: String,
    pub action_title: String,
    pub action_detail: String,
    pub anxiety_text: String,
    pub negative_image_url: Option<String>,
    pub positive_image_url: Option<String>,
    pub checklist_done: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub action_title: Option<String>,
    pub action_detail: Option<String>,
    pub anxiety_text: Option<String>,
    pub checklist_done: Option<bool>,
    pub negative_image_url: Option<String>,
    pub positive_image_url: Option<String>,
}

impl TaskPatch {
    pub fn apply(self, task: &mut CalendarTask) {
        if let Some(v) = self.action_title {
            task.action_title = v;
        }
        if let Some(v) = self.action_detail {
            task.action_detail = v;
        }
        if let Some(v) = self.anxiety_text {
            task.anxiety_text = v;
        }
        if let Some(v) = self.checklist_done {
            task.checklist_done = v;
        }
        if let Some(v) = self.negative_image_url {
            task.negative_image_url = Some(v);
        }
        if let Some(v) = self.positive_image_url {
            task.positive_image_url = Some(v);
        }
    }
}
