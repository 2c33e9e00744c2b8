use chrono::Utc;

use crate::dto::GenerateResponse;
use crate::models::card::{ActionPlan, CardStatus, NegativeCard, PositiveCard};
use crate::services::prompts::{negative_prompt, positive_prompt};

/// Fixed card served when `MOCK_GENERATION=true`. Not persisted.
pub fn mock_card() -> GenerateResponse {
    GenerateResponse {
        card_id: format!("mock-{}", Utc::now().timestamp_millis()),
        negative: NegativeCard {
            name: "鎖の思考".into(),
            keywords: ["停滞".into(), "恐れ".into()],
            interpretation: "考えすぎることで身動きが取れなくなっている状態".into(),
            emotion: "rumination".into(),
            image_prompt: negative_prompt("rumination"),
            image_url: None,
        },
        positive: PositiveCard {
            name: "小さな一歩".into(),
            keywords: ["行動".into(), "流れ".into()],
            interpretation: "完璧でなくても動くことで状況は変わる".into(),
            theme: "small step".into(),
            image_prompt: positive_prompt("small step"),
            image_url: None,
        },
        action: ActionPlan {
            title: "紙に3行だけ書く".into(),
            minutes: 10,
            reason: "頭の中の渦を外に出す最小の一歩".into(),
            scheduled_date: None,
            checklist_done: None,
            checklist_done_at: None,
            image_url: None,
        },
        status: CardStatus::default(),
    }
}
