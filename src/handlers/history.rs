use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::auth::middleware::Requester;
use crate::dto::{HistoryItem, HistoryQuery, HistoryResponse};
use crate::error::{AppError, AppResult};
use crate::AppState;

fn is_public(flag: Option<&str>) -> bool {
    matches!(flag.map(str::trim), Some("1") | Some("true"))
}

/// Recent cards of one user, or of everyone with `public=1`. Newest first.
pub async fn get_history(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<HistoryResponse>> {
    let limit = state.config.history_limit;

    let cards = if is_public(query.public.as_deref()) {
        state.store.list_recent_cards(limit).await
    } else {
        let user_id = query
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::validation("user_id is required"))?;
        requester.authorize(user_id)?;
        state.store.list_cards_for_user(user_id, limit).await
    }
    .map_err(|e| AppError::failed("history_failed", e))?;

    Ok(Json(HistoryResponse {
        items: cards.iter().map(HistoryItem::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::test_support::{sample_card, test_config, Harness, ScriptedImages, ScriptedText};

    #[tokio::test]
    async fn test_history_newest_first_and_capped() {
        let mut config = test_config();
        config.history_limit = 3;
        let harness = Harness::build(ScriptedText::default(), ScriptedImages::default(), config);

        for i in 0..5 {
            let mut card = sample_card(&format!("c{i}"), "u1", None);
            card.created_at += Duration::minutes(i);
            harness.seed_card(card).await;
        }
        harness.seed_card(sample_card("x", "u2", None)).await;

        let (status, body) = harness.get("/api/history?user_id=u1").await;
        assert_eq!(status, 200);
        let ids: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["card_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["c4", "c3", "c2"]);
        assert!(body["items"][0]["negative_image_url"].is_null());
    }

    #[tokio::test]
    async fn test_public_history_spans_users() {
        let harness = Harness::new();
        harness.seed_card(sample_card("a", "u1", None)).await;
        harness.seed_card(sample_card("b", "u2", None)).await;

        let (status, body) = harness.get("/api/history?public=1").await;
        assert_eq!(status, 200);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_history_requires_user_outside_public_mode() {
        let harness = Harness::new();
        let (status, body) = harness.get("/api/history").await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "validation_error");
    }
}
