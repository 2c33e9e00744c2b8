use serde::Serialize;

use crate::models::card::CardRecord;
use crate::models::task::CalendarTask;

/// Calendar view row; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CalendarItem {
    Card(CardItem),
    Task(TaskItem),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardItem {
    pub id: String,
    pub card_id: String,
    pub scheduled_date: String,
    pub action_title: String,
    pub action_detail: String,
    pub anxiety_text: String,
    pub checklist_done: bool,
    pub image_url: Option<String>,
    pub negative_image_url: Option<String>,
    pub positive_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskItem {
    pub id: String,
    pub task_id: String,
    pub scheduled_date: String,
    pub action_title: String,
    pub action_detail: String,
    pub anxiety_text: String,
    pub checklist_done: bool,
    pub image_url: Option<String>,
    pub negative_image_url: Option<String>,
    pub positive_image_url: Option<String>,
}

impl CalendarItem {
    pub fn scheduled_date(&self) -> &str {
        match self {
            CalendarItem::Card(item) => &item.scheduled_date,
            CalendarItem::Task(item) => &item.scheduled_date,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            CalendarItem::Card(item) => &item.id,
            CalendarItem::Task(item) => &item.id,
        }
    }

    /// Project a card; cards without a scheduled date have no calendar presence.
    pub fn from_card(card: &CardRecord) -> Option<Self> {
        let scheduled_date = card.action.scheduled_date.clone()?;
        Some(CalendarItem::Card(CardItem {
            id: card.card_id.clone(),
            card_id: card.card_id.clone(),
            scheduled_date,
            action_title: card.action.title.clone(),
            action_detail: card.action.reason.clone(),
            anxiety_text: card.anxiety_text.clone(),
            checklist_done: card.action.checklist_done.unwrap_or(false),
            image_url: card.negative.image_url.clone(),
            negative_image_url: card.negative.image_url.clone(),
            positive_image_url: card.positive.image_url.clone(),
        }))
    }

    pub fn from_task(task: &CalendarTask) -> Self {
        CalendarItem::Task(TaskItem {
            id: task.id.clone(),
            task_id: task.id.clone(),
            scheduled_date: task.scheduled_date.clone(),
            action_title: task.action_title.clone(),
            action_detail: task.action_detail.clone(),
            anxiety_text: task.anxiety_text.clone(),
            checklist_done: task.checklist_done,
            image_url: task.negative_image_url.clone(),
            negative_image_url: task.negative_image_url.clone(),
            positive_image_url: task.positive_image_url.clone(),
        })
    }
}
