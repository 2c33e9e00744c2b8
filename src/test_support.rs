//! Fixtures and scripted fakes shared by unit and router tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::auth::jwt::JwtVerifier;
use crate::auth::rate_limit::RateLimitState;
use crate::client::api::{ClientError, ImageApi, ImagePayload, ImageReply};
use crate::config::Config;
use crate::db::{MemoryStore, Store};
use crate::models::card::{
    ActionPlan, CardRecord, CardStatus, ImageStatus, NegativeCard, PositiveCard,
};
use crate::models::task::CalendarTask;
use crate::services::gemini::{TextGenError, TextGenerator};
use crate::services::imagen::{GeneratedImage, ImageGenError, ImageGenerator};
use crate::services::prompts::{negative_prompt, positive_prompt};
use crate::services::storage::{ObjectStorage, StorageError};
use crate::AppState;

pub const TEST_SECRET: &str = "test-secret";

pub fn sample_card(card_id: &str, user_id: &str, scheduled_date: Option<&str>) -> CardRecord {
    CardRecord {
        card_id: card_id.to_string(),
        user_id: user_id.to_string(),
        anxiety_text: "仕事の締切が近い".into(),
        negative: NegativeCard {
            name: "焦燥の砂時計".into(),
            keywords: ["焦り".into(), "重圧".into()],
            interpretation: "時間に追われて視野が狭くなっている".into(),
            emotion: "pressure".into(),
            image_prompt: negative_prompt("pressure"),
            image_url: None,
        },
        positive: PositiveCard {
            name: "静かな灯".into(),
            keywords: ["集中".into(), "余白".into()],
            interpretation: "一つずつ片付ければ道は見えてくる".into(),
            theme: "calm focus".into(),
            image_prompt: positive_prompt("calm focus"),
            image_url: None,
        },
        action: ActionPlan {
            title: "紙に3行だけ書く".into(),
            minutes: 10,
            reason: "頭の中を外に出す".into(),
            scheduled_date: scheduled_date.map(str::to_string),
            checklist_done: scheduled_date.map(|_| false),
            checklist_done_at: None,
            image_url: None,
        },
        status: CardStatus::default(),
        image_status: ImageStatus::Pending,
        image_error: None,
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
    }
}

pub fn sample_task(task_id: &str, user_id: &str, scheduled_date: &str) -> CalendarTask {
    CalendarTask {
        id: task_id.to_string(),
        user_id: user_id.to_string(),
        scheduled_date: scheduled_date.to_string(),
        action_title: "散歩する".into(),
        action_detail: String::new(),
        anxiety_text: String::new(),
        negative_image_url: None,
        positive_image_url: None,
        checklist_done: false,
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
    }
}

/// A well-formed reflection payload in the canonical shape.
pub fn reflection_payload() -> Value {
    json!({
        "negative": {
            "name": "焦燥の砂時計",
            "keywords": ["焦り", "重圧"],
            "interpretation": "時間に追われて視野が狭くなっている",
            "emotion": "pressure",
            "image_prompt": "dark hourglass, 9:16"
        },
        "positive": {
            "name": "静かな灯",
            "keywords": ["集中", "余白"],
            "interpretation": "一つずつ片付ければ道は見えてくる",
            "theme": "calm focus",
            "image_prompt": "warm lantern, 9:16"
        },
        "action": { "title": "紙に3行だけ書く", "minutes": 10, "reason": "頭の中を外に出す" }
    })
}

/// Replays queued results; an empty queue yields an upstream error.
#[derive(Default)]
pub struct ScriptedText {
    replies: Mutex<VecDeque<Result<Value, TextGenError>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    pub fn with(replies: Vec<Result<Value, TextGenError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::default(),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate_json(&self, prompt: &str) -> Result<Value, TextGenError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TextGenError::Upstream {
                status: 500,
                body: "no scripted reply".into(),
            }))
    }
}

/// Replays queued results; an empty queue yields a small PNG-ish image.
#[derive(Default)]
pub struct ScriptedImages {
    replies: Mutex<VecDeque<Result<GeneratedImage, ImageGenError>>>,
    pub calls: Mutex<u32>,
}

impl ScriptedImages {
    pub fn with(replies: Vec<Result<GeneratedImage, ImageGenError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::default(),
        }
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImages {
    async fn generate(&self, _prompt: &str) -> Result<GeneratedImage, ImageGenError> {
        *self.calls.lock().unwrap() += 1;
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(GeneratedImage {
                bytes: vec![0x89, b'P', b'N', b'G'],
                mime_type: "image/png".into(),
            })
        })
    }
}

/// Object storage that only records paths.
#[derive(Default)]
pub struct RecordingStorage {
    pub paths: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn upload(
        &self,
        _bytes: Vec<u8>,
        _content_type: &str,
        path: &str,
    ) -> Result<String, StorageError> {
        self.paths.lock().unwrap().push(path.to_string());
        Ok(format!("https://cdn.test/{path}"))
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: None,
        host: "127.0.0.1".into(),
        port: 0,
        frontend_url: "http://localhost:3000".into(),
        jwt_secret: TEST_SECRET.into(),
        google_api_key: String::new(),
        google_api_base: "http://upstream.invalid".into(),
        gemini_model: "gemini-test".into(),
        imagen_model: "imagen-test".into(),
        upstream_timeout_secs: 5,
        gcs_bucket: None,
        gcs_access_token: String::new(),
        gcs_public_base: "https://cdn.test".into(),
        mock_generation: false,
        generation_rate_limit: 1000,
        history_limit: 20,
        negative_candidates: 3,
    }
}

/// Handles to the fakes behind a test [`AppState`].
pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub text: Arc<ScriptedText>,
    pub images: Arc<ScriptedImages>,
    pub storage: Arc<RecordingStorage>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(ScriptedText::default(), ScriptedImages::default(), test_config())
    }

    pub fn build(text: ScriptedText, images: ScriptedImages, config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let text = Arc::new(text);
        let images = Arc::new(images);
        let storage = Arc::new(RecordingStorage::default());
        let state = AppState {
            store: store.clone(),
            text_gen: text.clone(),
            image_gen: images.clone(),
            storage: storage.clone(),
            verifier: Arc::new(JwtVerifier::new(TEST_SECRET)),
            config: Arc::new(config),
            rate_limiter: RateLimitState::new(),
        };
        Self {
            state,
            store,
            text,
            images,
            storage,
        }
    }

    pub async fn seed_card(&self, card: CardRecord) {
        self.store.insert_card(&card).await.unwrap();
    }

    pub async fn seed_task(&self, task: CalendarTask) {
        self.store.insert_task(&task).await.unwrap();
    }

    pub async fn card(&self, card_id: &str) -> CardRecord {
        self.store.get_card(card_id).await.unwrap().expect("card exists")
    }

    pub async fn task(&self, task_id: &str) -> Option<CalendarTask> {
        self.store.get_task(task_id).await.unwrap()
    }

    /// Object paths written so far, in upload order.
    pub fn uploads(&self) -> Vec<String> {
        self.storage.paths.lock().unwrap().clone()
    }

    async fn send(&self, req: Request<Body>) -> (u16, Value) {
        let response: Response<Body> = crate::router(self.state.clone())
            .oneshot(req)
            .await
            .unwrap();
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (u16, Value) {
        self.post_as(uri, body, None).await
    }

    pub async fn post_as(&self, uri: &str, body: Value, token: Option<&str>) -> (u16, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_raw(&self, uri: &str, body: &'static str) -> (u16, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    pub async fn get(&self, uri: &str) -> (u16, Value) {
        self.get_as(uri, None).await
    }

    pub async fn get_as(&self, uri: &str, token: Option<&str>) -> (u16, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

pub fn reply(http_status: u16, image_url: Option<&str>, message: Option<&str>) -> ImageReply {
    ImageReply {
        http_status,
        status: None,
        image_url: image_url.map(str::to_string),
        error: None,
        message: message.map(str::to_string),
    }
}

/// Scripted draw-session backend; records every call.
#[derive(Default)]
pub struct ScriptedApi {
    replies: Mutex<VecDeque<ImageReply>>,
    fallback: Option<ImageReply>,
    pub payloads: Mutex<Vec<(ImagePayload, bool)>>,
    pub selections: Mutex<Vec<String>>,
    pub fail_selection: bool,
    /// Raised on the first image call, to simulate teardown mid-flight.
    pub cancel_on_call: Option<Arc<AtomicBool>>,
}

impl ScriptedApi {
    pub fn with(replies: Vec<ImageReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    pub fn repeating(reply: ImageReply) -> Self {
        Self {
            fallback: Some(reply),
            ..Default::default()
        }
    }

    /// Every `select_image` call is recorded and then rejected.
    pub fn failing_selection() -> Self {
        Self {
            fail_selection: true,
            ..Default::default()
        }
    }

    pub fn image_calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn refresh_flags(&self) -> Vec<bool> {
        self.payloads.lock().unwrap().iter().map(|(_, f)| *f).collect()
    }
}

#[async_trait]
impl ImageApi for ScriptedApi {
    async fn post_image(
        &self,
        payload: &ImagePayload,
        force_refresh: bool,
    ) -> Result<ImageReply, ClientError> {
        self.payloads
            .lock()
            .unwrap()
            .push((payload.clone(), force_refresh));
        if let Some(flag) = &self.cancel_on_call {
            flag.store(true, Ordering::SeqCst);
        }
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| {
                let index = payload.candidate_index.unwrap_or(9);
                reply(200, Some(&format!("https://cdn.test/{index}.png")), None)
            }))
    }

    async fn select_image(
        &self,
        _card_id: &str,
        _user_id: &str,
        image_url: &str,
    ) -> Result<(), ClientError> {
        self.selections.lock().unwrap().push(image_url.to_string());
        if self.fail_selection {
            return Err(ClientError::Token("selection rejected".into()));
        }
        Ok(())
    }
}
