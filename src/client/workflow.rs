//! Draw session: three paced negative candidates, one positive image, and the
//! user's pick among the candidates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::api::{ImageApi, ImagePayload};
use crate::client::retry::{fetch_image_with_retry, RetryPolicy};
use crate::dto::{GenerateResponse, ImageKind};

#[derive(Debug, Clone, PartialEq)]
pub struct DrawConfig {
    pub candidates: u8,
    /// Pause after each candidate request.
    pub pacing: Duration,
    /// Delay before the positive request while candidates are still running.
    pub positive_grace: Duration,
    pub retry: RetryPolicy,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            candidates: 3,
            pacing: Duration::from_millis(800),
            positive_grace: Duration::from_millis(1200),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    pub url: Option<String>,
    pub error: Option<String>,
    pub busy: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    pub candidates: Vec<Slot>,
    pub candidates_running: bool,
    pub positive: Slot,
    pub selected: Option<String>,
}

/// Identity and prompts of the card being drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCard {
    pub card_id: String,
    pub user_id: String,
    pub negative_prompt: String,
    pub positive_prompt: String,
}

impl DrawCard {
    pub fn from_generated(card: &GenerateResponse, user_id: &str) -> Self {
        Self {
            card_id: card.card_id.clone(),
            user_id: user_id.to_string(),
            negative_prompt: card.negative.image_prompt.clone(),
            positive_prompt: card.positive.image_prompt.clone(),
        }
    }
}

pub struct DrawSession {
    api: Arc<dyn ImageApi>,
    card: DrawCard,
    config: DrawConfig,
    board: Arc<Mutex<Board>>,
    cancelled: Arc<AtomicBool>,
}

impl DrawSession {
    pub fn new(api: Arc<dyn ImageApi>, card: DrawCard, config: DrawConfig) -> Self {
        let board = Board {
            candidates: vec![Slot::default(); config.candidates as usize],
            ..Default::default()
        };
        Self {
            api,
            card,
            config,
            board: Arc::new(Mutex::new(board)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn board(&self) -> Board {
        self.board.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Tear down: every later state update is dropped.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn update(&self, apply: impl FnOnce(&mut Board)) {
        if self.is_cancelled() {
            return;
        }
        if let Ok(mut board) = self.board.lock() {
            apply(&mut board);
        }
    }

    fn candidate_payload(&self, index: u8) -> ImagePayload {
        ImagePayload {
            card_id: self.card.card_id.clone(),
            user_id: self.card.user_id.clone(),
            kind: ImageKind::NegativeCandidate,
            prompt: self.card.negative_prompt.clone(),
            candidate_index: Some(index),
        }
    }

    /// Generate candidates and the positive image.
    pub async fn run(&self) {
        self.update(|b| b.candidates_running = true);
        tokio::join!(self.run_candidates(), self.run_positive());
    }

    /// One candidate at a time, pausing between requests.
    pub async fn run_candidates(&self) {
        self.update(|b| b.candidates_running = true);
        for index in 0..self.config.candidates {
            if self.is_cancelled() {
                break;
            }
            self.fill_candidate(index).await;
            tokio::time::sleep(self.config.pacing).await;
        }
        self.update(|b| b.candidates_running = false);
    }

    pub async fn run_positive(&self) {
        self.update(|b| b.positive.busy = true);
        let still_running = self.board().candidates_running;
        if still_running {
            tokio::time::sleep(self.config.positive_grace).await;
        }
        if self.is_cancelled() {
            return;
        }

        let payload = ImagePayload {
            card_id: self.card.card_id.clone(),
            user_id: self.card.user_id.clone(),
            kind: ImageKind::Positive,
            prompt: self.card.positive_prompt.clone(),
            candidate_index: None,
        };
        let result = fetch_image_with_retry(self.api.as_ref(), &payload, &self.config.retry).await;

        self.update(|b| {
            match result {
                Ok(url) => b.positive.url = Some(url),
                Err(failure) => b.positive.error = Some(failure.message),
            }
            b.positive.busy = false;
        });
    }

    /// Manual retry of a failed slot.
    pub async fn retry_candidate(&self, index: u8) {
        if index >= self.config.candidates {
            return;
        }
        self.fill_candidate(index).await;
    }

    async fn fill_candidate(&self, index: u8) {
        let slot = index as usize;
        self.update(|b| {
            b.candidates[slot].busy = true;
            b.candidates[slot].error = None;
        });

        let payload = self.candidate_payload(index);
        let result = fetch_image_with_retry(self.api.as_ref(), &payload, &self.config.retry).await;

        if let Err(failure) = &result {
            tracing::warn!(
                card_id = %self.card.card_id,
                candidate_index = index,
                attempts = failure.attempts,
                error = %failure.message,
                "Candidate failed"
            );
        }
        self.update(|b| {
            let slot = &mut b.candidates[slot];
            match result {
                Ok(url) => slot.url = Some(url),
                Err(failure) => slot.error = Some(failure.message),
            }
            slot.busy = false;
        });
    }

    /// Pick a candidate. The pick stands even if persisting it fails.
    pub fn select_candidate(&self, url: &str) -> JoinHandle<()> {
        self.update(|b| b.selected = Some(url.to_string()));

        let api = self.api.clone();
        let card_id = self.card.card_id.clone();
        let user_id = self.card.user_id.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            if let Err(e) = api.select_image(&card_id, &user_id, &url).await {
                tracing::warn!(card_id = %card_id, error = %e, "Selection not persisted");
            }
        })
    }
}
