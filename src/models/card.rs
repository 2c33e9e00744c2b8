use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeCard {
    pub name: String,
    pub keywords: [String; 2],
    pub interpretation: String,
    pub emotion: String,
    pub image_prompt: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositiveCard {
    pub name: String,
    pub keywords: [String; 2],
    pub interpretation: String,
    pub theme: String,
    pub image_prompt: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub title: String,
    pub minutes: u32,
    pub reason: String,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub checklist_done: Option<bool>,
    #[serde(default)]
    pub checklist_done_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Checklist fields of an action, always written together.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChecklistState {
    pub done: Option<bool>,
    pub done_at: Option<DateTime<Utc>>,
}

impl ChecklistState {
    pub fn marked(done: bool, now: DateTime<Utc>) -> Self {
        Self {
            done: Some(done),
            done_at: done.then_some(now),
        }
    }

    /// Freshly scheduled: not done yet.
    pub fn reset() -> Self {
        Self {
            done: Some(false),
            done_at: None,
        }
    }

    /// Off the calendar: no checklist at all.
    pub fn cleared() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CardStatus {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Image pipeline state for a card.
///
/// `pending -> partial -> ready`, with `selected` reachable by explicit candidate
/// selection and `error`/`filtered` reachable from any generation attempt. No state
/// is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "image_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    #[default]
    Pending,
    Partial,
    Ready,
    Selected,
    Filtered,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub card_id: String,
    pub user_id: String,
    pub anxiety_text: String,
    pub negative: NegativeCard,
    pub positive: PositiveCard,
    pub action: ActionPlan,
    pub status: CardStatus,
    pub image_status: ImageStatus,
    pub image_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Narrow field-level update applied to a stored card. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct CardPatch {
    pub negative_image_url: Option<String>,
    pub positive_image_url: Option<String>,
    pub image_status: Option<ImageStatus>,
    /// `Some(None)` clears the last error.
    pub image_error: Option<Option<String>>,
    pub action_title: Option<String>,
    pub action_reason: Option<String>,
    pub action_minutes: Option<u32>,
    /// `Some(None)` takes the card off the calendar.
    pub scheduled_date: Option<Option<String>>,
    pub checklist: Option<ChecklistState>,
    pub anxiety_text: Option<String>,
    pub status: Option<CardStatus>,
}

impl CardPatch {
    pub fn apply(self, card: &mut CardRecord) {
        if let Some(url) = self.negative_image_url {
            card.negative.image_url = Some(url);
        }
        if let Some(url) = self.positive_image_url {
            card.positive.image_url = Some(url);
        }
        if let Some(status) = self.image_status {
            card.image_status = status;
        }
        if let Some(error) = self.image_error {
            card.image_error = error;
        }
        if let Some(title) = self.action_title {
            card.action.title = title;
        }
        if let Some(reason) = self.action_reason {
            card.action.reason = reason;
        }
        if let Some(minutes) = self.action_minutes {
            card.action.minutes = minutes;
        }
        if let Some(date) = self.scheduled_date {
            card.action.scheduled_date = date;
        }
        if let Some(checklist) = self.checklist {
            card.action.checklist_done = checklist.done;
            card.action.checklist_done_at = checklist.done_at;
        }
        if let Some(text) = self.anxiety_text {
            card.anxiety_text = text;
        }
        if let Some(status) = self.status {
            card.status = status;
        }
    }
}
