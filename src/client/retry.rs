//! Bounded retry for image requests.
//!
//! Only rate limiting, quota exhaustion and expired tokens are retried; any
//! other failure is returned to the caller on the first attempt.

use std::time::Duration;

use rand::Rng;

use crate::client::api::{ImageApi, ImagePayload, ImageReply};

const RETRY_MARKERS: &[&str] = &["RESOURCE_EXHAUSTED", "Quota exceeded", "429", "rate_limited"];

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Added per completed attempt.
    pub step: Duration,
    /// Upper bound of the random extra delay.
    pub jitter: Duration,
    pub token_refresh_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(900),
            step: Duration::from_millis(800),
            jitter: Duration::from_millis(250),
            token_refresh_pause: Duration::from_millis(400),
        }
    }
}

impl RetryPolicy {
    /// Same retry count, no waiting.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            step: Duration::ZERO,
            jitter: Duration::ZERO,
            token_refresh_pause: Duration::ZERO,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.base_delay + self.step * attempt + Duration::from_millis(extra)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct FetchFailure {
    pub message: String,
    pub attempts: u32,
}

pub fn is_token_expired(reply: &ImageReply) -> bool {
    reply.error.as_deref() == Some("token_expired")
}

pub fn is_retryable(reply: &ImageReply) -> bool {
    if reply.http_status == 429 {
        return true;
    }
    let text = reply.text();
    let error = reply.error.as_deref().unwrap_or_default();
    RETRY_MARKERS
        .iter()
        .any(|marker| text.contains(marker) || error.contains(marker))
}

/// Request one image, retrying transient failures.
///
/// A successful reply without an `image_url` (filtered, mock) is a failure that is
/// not retried. Makes at most `1 + max_retries` requests.
pub async fn fetch_image_with_retry(
    api: &dyn ImageApi,
    payload: &ImagePayload,
    policy: &RetryPolicy,
) -> Result<String, FetchFailure> {
    let mut attempt = 0;
    loop {
        let attempts = attempt + 1;
        let reply = api
            .post_image(payload, attempt > 0)
            .await
            .map_err(|e| FetchFailure {
                message: e.to_string(),
                attempts,
            })?;

        if reply.is_success() {
            return match reply.image_url {
                Some(url) => Ok(url),
                None => Err(FetchFailure {
                    message: reply.text(),
                    attempts,
                }),
            };
        }

        let can_retry = attempt < policy.max_retries;
        if can_retry && is_token_expired(&reply) {
            tracing::debug!(attempt = attempts, "Token expired, refreshing");
            tokio::time::sleep(policy.token_refresh_pause).await;
        } else if can_retry && is_retryable(&reply) {
            let delay = policy.backoff(attempt);
            tracing::debug!(
                attempt = attempts,
                status = reply.http_status,
                delay_ms = delay.as_millis() as u64,
                "Image request throttled, backing off"
            );
            tokio::time::sleep(delay).await;
        } else {
            return Err(FetchFailure {
                message: reply.text(),
                attempts,
            });
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::ImageKind;
    use crate::test_support::{reply, ScriptedApi};

    fn payload() -> ImagePayload {
        ImagePayload {
            card_id: "c1".into(),
            user_id: "u1".into(),
            kind: ImageKind::NegativeCandidate,
            prompt: "p".into(),
            candidate_index: Some(0),
        }
    }

    #[test]
    fn test_backoff_grows_by_step() {
        let policy = RetryPolicy {
            jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(900));
        assert_eq!(policy.backoff(1), Duration::from_millis(1700));

        let jittered = RetryPolicy::default().backoff(0);
        assert!(jittered >= Duration::from_millis(900));
        assert!(jittered <= Duration::from_millis(1150));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&reply(429, None, Some("rate_limited"))));
        assert!(is_retryable(&reply(500, None, Some("429 RESOURCE_EXHAUSTED"))));
        assert!(is_retryable(&reply(500, None, Some("Quota exceeded for model"))));
        assert!(!is_retryable(&reply(500, None, Some("boom"))));
        assert!(!is_retryable(&reply(403, None, Some("forbidden"))));
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_makes_exactly_one_plus_max_attempts() {
        let api = ScriptedApi::repeating(reply(429, None, Some("rate_limited")));
        let policy = RetryPolicy::immediate(2);

        let failure = fetch_image_with_retry(&api, &payload(), &policy)
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(api.image_calls(), 3);
        assert_eq!(failure.message, "rate_limited");
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let api = ScriptedApi::with(vec![
            reply(500, None, Some("429 RESOURCE_EXHAUSTED")),
            reply(200, Some("https://cdn.test/a.png"), None),
        ]);
        let url = fetch_image_with_retry(&api, &payload(), &RetryPolicy::immediate(2))
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.test/a.png");
        assert_eq!(api.image_calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_token_forces_refresh() {
        let mut expired = reply(401, None, None);
        expired.error = Some("token_expired".into());
        let api = ScriptedApi::with(vec![expired, reply(200, Some("https://cdn.test/a.png"), None)]);

        fetch_image_with_retry(&api, &payload(), &RetryPolicy::immediate(2))
            .await
            .unwrap();
        assert_eq!(api.refresh_flags(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_other_failures_are_terminal() {
        let api = ScriptedApi::with(vec![reply(500, None, Some("boom"))]);
        let failure = fetch_image_with_retry(&api, &payload(), &RetryPolicy::immediate(2))
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 1);

        let api = ScriptedApi::with(vec![reply(200, None, Some("filtered"))]);
        let failure = fetch_image_with_retry(&api, &payload(), &RetryPolicy::immediate(2))
            .await
            .unwrap_err();
        assert_eq!(failure.message, "filtered");
        assert_eq!(api.image_calls(), 1);
    }
}
