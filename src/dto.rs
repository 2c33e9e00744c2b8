//! # Request/Response DTOs
//!
//! Every JSON contract of the HTTP API lives here.
//!
//! Conventions:
//! - `*Request`  → deserialized from client JSON body or query params
//! - `*Response` → serialized to client JSON
//! - Required string fields default to empty and are rejected by `validator`
//!   rules, so a missing field is a `validation_error`, not `invalid_json`
//! - Cross-field rules use struct-level `schema` validators

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{AppError, AppResult};
use crate::models::calendar::CalendarItem;
use crate::models::card::{ActionPlan, CardRecord, CardStatus, NegativeCard, PositiveCard};

pub const MAX_ANXIETY_TEXT_CHARS: usize = 300;

// ============================================================================
// Validation plumbing
// ============================================================================

fn error_with(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Non-blank string.
fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn anxiety_text_length(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(error_with("empty", "anxiety_text is empty"));
    }
    if len > MAX_ANXIETY_TEXT_CHARS {
        return Err(error_with("too_long", "anxiety_text is too long"));
    }
    Ok(())
}

/// Flatten `validator` output into one human-readable line.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| match (&err.message, &*err.code) {
                (Some(message), _) => message.to_string(),
                (None, "required") => format!("{field} is required"),
                (None, code) => format!("{field} is invalid ({code})"),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub trait ValidatedExt: Validate + Sized {
    fn validated(self) -> AppResult<Self> {
        self.validate()
            .map_err(|errors| AppError::Validation(validation_message(&errors)))?;
        Ok(self)
    }
}

impl<T: Validate> ValidatedExt for T {}

// ============================================================================
// Shared enums
// ============================================================================

/// Which image a `POST images` call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Negative,
    Positive,
    NegativeCandidate,
}

/// Card side for task images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideKind {
    Negative,
    Positive,
}

impl SideKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SideKind::Negative => "negative",
            SideKind::Positive => "positive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Card,
    Task,
}

/// A calendar entry addressed by id; one of the two record kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    Card(String),
    Task(String),
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ItemRef {
    /// Resolve from an explicit kind plus the matching id.
    pub fn from_kind(
        kind: Option<ItemKind>,
        card_id: Option<&str>,
        task_id: Option<&str>,
    ) -> AppResult<Self> {
        match kind {
            Some(ItemKind::Card) => non_blank(card_id)
                .map(|id| ItemRef::Card(id.to_string()))
                .ok_or_else(|| AppError::validation("card_id is required")),
            Some(ItemKind::Task) => non_blank(task_id)
                .map(|id| ItemRef::Task(id.to_string()))
                .ok_or_else(|| AppError::validation("task_id is required")),
            None => Err(AppError::validation("kind is required")),
        }
    }

    /// Resolve from exactly one of two ids.
    pub fn from_exactly_one(card_id: Option<&str>, task_id: Option<&str>) -> AppResult<Self> {
        match (non_blank(card_id), non_blank(task_id)) {
            (Some(id), None) => Ok(ItemRef::Card(id.to_string())),
            (None, Some(id)) => Ok(ItemRef::Task(id.to_string())),
            _ => Err(AppError::validation(
                "exactly one of card_id or task_id is required",
            )),
        }
    }
}

// ============================================================================
// Generate
// ============================================================================

/// POST /api/generate
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[serde(default)]
    #[validate(custom = "anxiety_text_length")]
    pub anxiety_text: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,

    pub locale: Option<String>,
}

/// Card body as returned to the client; image URLs are still null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub card_id: String,
    pub negative: NegativeCard,
    pub positive: PositiveCard,
    pub action: ActionPlan,
    pub status: CardStatus,
}

impl From<&CardRecord> for GenerateResponse {
    fn from(card: &CardRecord) -> Self {
        Self {
            card_id: card.card_id.clone(),
            negative: card.negative.clone(),
            positive: card.positive.clone(),
            action: card.action.clone(),
            status: card.status.clone(),
        }
    }
}

// ============================================================================
// Images
// ============================================================================

fn candidate_index_matches_kind(req: &ImageRequest) -> Result<(), ValidationError> {
    match (req.kind, req.candidate_index) {
        (Some(ImageKind::NegativeCandidate), None) => Err(error_with(
            "candidate_index",
            "candidate_index is required for negative_candidate",
        )),
        _ => Ok(()),
    }
}

/// POST /api/images
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "candidate_index_matches_kind", skip_on_field_errors = false))]
pub struct ImageRequest {
    #[serde(default)]
    #[validate(custom = "required")]
    pub card_id: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,

    #[validate(required(message = "kind is required"))]
    pub kind: Option<ImageKind>,

    #[serde(default)]
    #[validate(custom = "required")]
    pub prompt: String,

    pub candidate_index: Option<u8>,
}

/// Shared by `images` and `task-image`.
///
/// `status` ∈ mock | candidate_ready | partial | ready | ok | filtered
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_index: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ImageResponse {
    pub fn status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            image_url: None,
            candidate_index: None,
            message: None,
        }
    }
}

/// POST /api/select-image
#[derive(Debug, Deserialize, Validate)]
pub struct SelectImageRequest {
    #[serde(default)]
    #[validate(custom = "required")]
    pub card_id: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct SelectImageResponse {
    pub status: &'static str,
    pub image_url: String,
}

// ============================================================================
// Card lifecycle
// ============================================================================

/// POST /api/register
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(custom = "required")]
    pub card_id: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub scheduled_date: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub action_title: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub action_reason: String,

    #[validate(range(min = 1, max = 1440, message = "action_minutes must be 1-1440"))]
    pub action_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    pub scheduled_date: String,
}

/// POST /api/checklist
#[derive(Debug, Deserialize, Validate)]
pub struct ChecklistRequest {
    pub card_id: Option<String>,
    pub task_id: Option<String>,

    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,

    #[validate(required(message = "done is required"))]
    pub done: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ChecklistResponse {
    pub status: &'static str,
    pub done: bool,
}

/// POST /api/complete
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteRequest {
    #[serde(default)]
    #[validate(custom = "required")]
    pub card_id: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub status: CardStatus,
}

// ============================================================================
// Calendar & tasks
// ============================================================================

/// GET /api/calendar?user_id&month=YYYY-MM
#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub user_id: Option<String>,
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub items: Vec<CalendarItem>,
}

/// POST /api/calendar-task
#[derive(Debug, Deserialize, Validate)]
pub struct CalendarTaskRequest {
    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub scheduled_date: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub action_title: String,
}

#[derive(Debug, Serialize)]
pub struct CalendarTaskResponse {
    pub status: &'static str,
    pub task_id: String,
}

/// POST /api/task-update
#[derive(Debug, Deserialize, Validate)]
pub struct TaskUpdateRequest {
    pub kind: Option<ItemKind>,
    pub card_id: Option<String>,
    pub task_id: Option<String>,

    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub action_title: String,

    #[serde(default)]
    pub action_detail: String,

    #[serde(default)]
    pub anxiety_text: String,
}

/// POST /api/task-delete
#[derive(Debug, Deserialize, Validate)]
pub struct TaskDeleteRequest {
    pub kind: Option<ItemKind>,
    pub card_id: Option<String>,
    pub task_id: Option<String>,

    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,
}

/// POST /api/task-image
#[derive(Debug, Deserialize, Validate)]
pub struct TaskImageRequest {
    #[serde(default)]
    #[validate(custom = "required")]
    pub task_id: String,

    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,

    #[validate(required(message = "kind is required"))]
    pub kind: Option<SideKind>,

    #[serde(default)]
    #[validate(custom = "required")]
    pub anxiety_text: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub status: &'static str,
}

// ============================================================================
// History & self image
// ============================================================================

/// GET /api/history?user_id | public=1
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: Option<String>,
    pub public: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub card_id: String,
    pub negative_image_url: Option<String>,
    pub positive_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&CardRecord> for HistoryItem {
    fn from(card: &CardRecord) -> Self {
        Self {
            card_id: card.card_id.clone(),
            negative_image_url: card.negative.image_url.clone(),
            positive_image_url: card.positive.image_url.clone(),
            created_at: card.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub items: Vec<HistoryItem>,
}

/// POST /api/self-image
#[derive(Debug, Deserialize, Validate)]
pub struct SelfImageRequest {
    #[serde(default)]
    #[validate(custom = "required")]
    pub user_id: String,
}

/// GET /api/self-image?user_id
#[derive(Debug, Deserialize)]
pub struct SelfImageQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SelfImageResponse {
    pub image_url: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
