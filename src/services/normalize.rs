//! Reduce the loosely-shaped JSON returned by the text generator to a strict
//! [`NormalizedReflection`].
//!
//! The model output drifts: sections may sit under a `reflection` wrapper, use
//! `*_card` keys, carry image prompts in a separate `image_prompts` block, or return
//! the action as a bare string. Everything is resolved here so nothing downstream
//! ever sees the raw payload. The function is pure and all-or-nothing per card side
//! and for the action block.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::services::prompts::{negative_prompt, positive_prompt};

pub const DEFAULT_ACTION_MINUTES: u32 = 10;

const ACTION_TITLE_KEYS: &[&str] = &["title", "description", "action", "task"];
const ACTION_MINUTES_KEYS: &[&str] = &["minutes", "time_minutes", "duration_minutes", "duration"];
const ACTION_REASON_KEYS: &[&str] = &["reason", "why", "rationale"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedNegative {
    pub name: String,
    pub keywords: [String; 2],
    pub interpretation: String,
    pub emotion: String,
    pub image_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPositive {
    pub name: String,
    pub keywords: [String; 2],
    pub interpretation: String,
    pub theme: String,
    pub image_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAction {
    pub title: String,
    pub minutes: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReflection {
    pub negative: NormalizedNegative,
    pub positive: NormalizedPositive,
    pub action: NormalizedAction,
}

/// Result of the self-image summarization call.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfImagePrompt {
    pub image_prompt: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("Missing top-level sections in generated output. Payload={payload}")]
    MissingSections { payload: String },

    #[error("Negative card fields missing")]
    NegativeFieldsMissing,

    #[error("Positive card fields missing")]
    PositiveFieldsMissing,

    #[error("Action fields missing. Payload={payload}")]
    ActionFieldsMissing { payload: String },

    #[error("Self image prompt missing. Payload={payload}")]
    SelfImagePromptMissing { payload: String },
}

pub fn normalize_reflection(input: &Value) -> Result<NormalizedReflection, NormalizationError> {
    let root = input.get("reflection").filter(|v| !v.is_null()).unwrap_or(input);

    let negative = section(root, &["negative", "negative_card"]);
    let positive = section(root, &["positive", "positive_card"]);
    let action = root.get("action").filter(|v| !v.is_null());

    let (Some(negative), Some(positive), Some(action)) = (negative, positive, action) else {
        return Err(NormalizationError::MissingSections {
            payload: input.to_string(),
        });
    };

    let prompts = root
        .get("image_prompts")
        .or_else(|| input.get("image_prompts"))
        .and_then(Value::as_object);

    let negative = normalize_negative(negative, prompts)?;
    let positive = normalize_positive(positive, prompts)?;
    let action = normalize_action(action).ok_or_else(|| NormalizationError::ActionFieldsMissing {
        payload: input.to_string(),
    })?;

    Ok(NormalizedReflection {
        negative,
        positive,
        action,
    })
}

pub fn normalize_self_image(input: &Value) -> Result<SelfImagePrompt, NormalizationError> {
    let image_prompt = field_string(input, "image_prompt").ok_or_else(|| {
        NormalizationError::SelfImagePromptMissing {
            payload: input.to_string(),
        }
    })?;
    Ok(SelfImagePrompt {
        image_prompt,
        description: field_string(input, "description").unwrap_or_default(),
    })
}

// ── sections ────────────────────────────────────────────────────────────────

fn section<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| root.get(*key))
        .find(|v| !v.is_null())
}

struct SideFields {
    name: String,
    keywords: [String; 2],
    interpretation: String,
    tag: String,
    image_prompt: String,
}

/// Shared completeness check for both sides. `tag_key` is `emotion` or `theme`.
fn side_fields(
    section: &Value,
    tag_key: &str,
    prompt_keys: &[&str],
    prompts: Option<&Map<String, Value>>,
    fallback: fn(&str) -> String,
) -> Option<SideFields> {
    let name = field_string(section, "name");
    let tag = field_string(section, tag_key).unwrap_or_default();

    let image_prompt = field_string(section, "image_prompt")
        .or_else(|| {
            prompts.and_then(|p| {
                prompt_keys
                    .iter()
                    .find_map(|key| p.get(*key).and_then(coerce_string))
            })
        })
        // Only synthesize when the side is otherwise usable.
        .or_else(|| name.as_ref().map(|_| fallback(&tag)));

    Some(SideFields {
        name: name?,
        keywords: pick_keywords(section.get("keywords"))?,
        interpretation: field_string(section, "interpretation")?,
        tag,
        image_prompt: image_prompt?,
    })
}

fn normalize_negative(
    section: &Value,
    prompts: Option<&Map<String, Value>>,
) -> Result<NormalizedNegative, NormalizationError> {
    let fields = side_fields(
        section,
        "emotion",
        &["negative_card_prompt", "negative_prompt"],
        prompts,
        negative_prompt,
    )
    .ok_or(NormalizationError::NegativeFieldsMissing)?;

    Ok(NormalizedNegative {
        name: fields.name,
        keywords: fields.keywords,
        interpretation: fields.interpretation,
        emotion: fields.tag,
        image_prompt: fields.image_prompt,
    })
}

fn normalize_positive(
    section: &Value,
    prompts: Option<&Map<String, Value>>,
) -> Result<NormalizedPositive, NormalizationError> {
    let fields = side_fields(
        section,
        "theme",
        &["positive_card_prompt", "positive_prompt"],
        prompts,
        positive_prompt,
    )
    .ok_or(NormalizationError::PositiveFieldsMissing)?;

    Ok(NormalizedPositive {
        name: fields.name,
        keywords: fields.keywords,
        interpretation: fields.interpretation,
        theme: fields.tag,
        image_prompt: fields.image_prompt,
    })
}

/// Exactly two string elements, or nothing.
pub fn pick_keywords(value: Option<&Value>) -> Option<[String; 2]> {
    match value?.as_array()?.as_slice() {
        [Value::String(a), Value::String(b)] => Some([a.clone(), b.clone()]),
        _ => None,
    }
}

// ── action ──────────────────────────────────────────────────────────────────

fn normalize_action(action: &Value) -> Option<NormalizedAction> {
    if let Value::String(text) = action {
        let title = text.trim();
        if title.is_empty() {
            return None;
        }
        return Some(NormalizedAction {
            title: text.clone(),
            minutes: minutes_from_text(text).unwrap_or(DEFAULT_ACTION_MINUTES),
            reason: String::new(),
        });
    }

    let title = first_string(action, ACTION_TITLE_KEYS)?;
    let minutes = ACTION_MINUTES_KEYS
        .iter()
        .filter_map(|key| action.get(*key))
        .find(|v| !v.is_null())
        .and_then(coerce_minutes)
        .unwrap_or(DEFAULT_ACTION_MINUTES);
    let reason = first_string(action, ACTION_REASON_KEYS)
        .map(|r| r.trim().to_string())
        .unwrap_or_default();

    Some(NormalizedAction {
        title,
        minutes,
        reason,
    })
}

fn minutes_with_unit() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|\D)(\d{1,2})\s*(?:分|min)").expect("static minutes-with-unit pattern")
    })
}

fn any_minutes() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,2}").expect("static digit-run pattern"))
}

/// Minutes mentioned in a free-text action.
///
/// A one or two digit number followed by a minutes unit (`分`, `min`) wins; otherwise
/// the first run of one or two digits. "紙に3行書く(10分)" reads as 10, not 3. Longer
/// numbers never match the unit rule, so "120分" falls back to the first run (12).
pub fn minutes_from_text(text: &str) -> Option<u32> {
    let found = minutes_with_unit()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .or_else(|| any_minutes().find(text))?;
    found.as_str().parse().ok().filter(|m| *m > 0)
}

fn coerce_minutes(value: &Value) -> Option<u32> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() || raw < 1.0 || raw > u32::MAX as f64 {
        return None;
    }
    Some(raw.round() as u32)
}

// ── coercion ────────────────────────────────────────────────────────────────

/// Scalar to string; empty strings and non-scalars count as absent.
fn coerce_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn field_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(coerce_string)
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| field_string(value, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::prompts::ASPECT_RATIO;
    use serde_json::json;

    fn full_payload() -> Value {
        json!({
            "negative": {
                "name": "鎖の思考",
                "keywords": ["停滞", "恐れ"],
                "interpretation": "考えすぎて動けない",
                "emotion": "rumination",
                "image_prompt": "negative prompt 9:16"
            },
            "positive": {
                "name": "小さな一歩",
                "keywords": ["行動", "流れ"],
                "interpretation": "動けば状況は変わる",
                "theme": "small step",
                "image_prompt": "positive prompt 9:16"
            },
            "action": { "title": "紙に3行だけ書く", "minutes": 10, "reason": "頭の中を外に出す" }
        })
    }

    #[test]
    fn test_complete_payload_normalizes() {
        let result = normalize_reflection(&full_payload()).unwrap();
        assert_eq!(result.negative.name, "鎖の思考");
        assert_eq!(result.negative.keywords, ["停滞".to_string(), "恐れ".to_string()]);
        assert_eq!(result.negative.image_prompt, "negative prompt 9:16");
        assert_eq!(result.positive.theme, "small step");
        assert_eq!(result.action.minutes, 10);
        assert_eq!(result.action.reason, "頭の中を外に出す");
    }

    #[test]
    fn test_missing_any_section_fails_with_payload() {
        for key in ["negative", "positive", "action"] {
            let mut payload = full_payload();
            payload.as_object_mut().unwrap().remove(key);
            let err = normalize_reflection(&payload).unwrap_err();
            match err {
                NormalizationError::MissingSections { payload } => {
                    assert!(payload.contains("name"), "payload should be embedded");
                }
                other => panic!("expected MissingSections for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_reflection_wrapper_and_card_suffix_keys() {
        let inner = full_payload();
        let payload = json!({
            "reflection": {
                "negative_card": inner["negative"],
                "positive_card": inner["positive"],
                "action": inner["action"],
            }
        });
        let result = normalize_reflection(&payload).unwrap();
        assert_eq!(result.negative.emotion, "rumination");
        assert_eq!(result.positive.name, "小さな一歩");
    }

    #[test]
    fn test_keyword_extraction_is_strict() {
        for bad in [json!(["a"]), json!(["a", "b", "c"]), json!([1, 2]), json!("a,b"), json!(null)] {
            assert_eq!(pick_keywords(Some(&bad)), None, "{bad} should be absent");
        }
        assert_eq!(pick_keywords(None), None);
        assert_eq!(
            pick_keywords(Some(&json!(["a", "b"]))),
            Some(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_bad_keywords_fail_the_side() {
        let mut payload = full_payload();
        payload["negative"]["keywords"] = json!(["only one"]);
        assert_eq!(
            normalize_reflection(&payload).unwrap_err(),
            NormalizationError::NegativeFieldsMissing
        );

        let mut payload = full_payload();
        payload["positive"]["keywords"] = json!([1, 2]);
        assert_eq!(
            normalize_reflection(&payload).unwrap_err(),
            NormalizationError::PositiveFieldsMissing
        );
    }

    #[test]
    fn test_image_prompts_block_is_used_before_fallback() {
        let mut payload = full_payload();
        payload["negative"].as_object_mut().unwrap().remove("image_prompt");
        payload["positive"].as_object_mut().unwrap().remove("image_prompt");
        payload["image_prompts"] = json!({
            "negative_prompt": "from block",
            "positive_card_prompt": "positive from block"
        });
        let result = normalize_reflection(&payload).unwrap();
        assert_eq!(result.negative.image_prompt, "from block");
        assert_eq!(result.positive.image_prompt, "positive from block");
    }

    #[test]
    fn test_root_level_image_prompts_under_wrapper() {
        let inner = full_payload();
        let mut negative = inner["negative"].clone();
        negative.as_object_mut().unwrap().remove("image_prompt");
        let payload = json!({
            "reflection": {
                "negative": negative,
                "positive": inner["positive"],
                "action": inner["action"],
            },
            "image_prompts": { "negative_card_prompt": "outer block" }
        });
        let result = normalize_reflection(&payload).unwrap();
        assert_eq!(result.negative.image_prompt, "outer block");
    }

    #[test]
    fn test_fallback_prompt_contains_ratio_and_emotion() {
        let mut payload = full_payload();
        payload["negative"].as_object_mut().unwrap().remove("image_prompt");
        let result = normalize_reflection(&payload).unwrap();
        assert!(result.negative.image_prompt.contains(ASPECT_RATIO));
        assert!(result.negative.image_prompt.contains("rumination"));
    }

    #[test]
    fn test_fallback_prompt_with_empty_emotion_uses_default() {
        let mut payload = full_payload();
        let negative = payload["negative"].as_object_mut().unwrap();
        negative.remove("image_prompt");
        negative.insert("emotion".into(), json!(""));
        let result = normalize_reflection(&payload).unwrap();
        assert!(result.negative.image_prompt.contains("visual metaphors for anxiety"));
        assert_eq!(result.negative.emotion, "");
    }

    #[test]
    fn test_no_fallback_without_name() {
        let mut payload = full_payload();
        let negative = payload["negative"].as_object_mut().unwrap();
        negative.remove("image_prompt");
        negative.remove("name");
        assert_eq!(
            normalize_reflection(&payload).unwrap_err(),
            NormalizationError::NegativeFieldsMissing
        );
    }

    #[test]
    fn test_string_action() {
        let mut payload = full_payload();
        payload["action"] = json!("紙に3行書く(10分)");
        let action = normalize_reflection(&payload).unwrap().action;
        assert_eq!(action.title, "紙に3行書く(10分)");
        assert_eq!(action.minutes, 10);
        assert_eq!(action.reason, "");
    }

    #[test]
    fn test_string_action_without_digits_defaults() {
        let mut payload = full_payload();
        payload["action"] = json!("深呼吸する");
        assert_eq!(normalize_reflection(&payload).unwrap().action.minutes, 10);
    }

    #[test]
    fn test_minutes_from_text() {
        assert_eq!(minutes_from_text("散歩 15"), Some(15));
        assert_eq!(minutes_from_text("walk for 12 min"), Some(12));
        assert_eq!(minutes_from_text("3 lines, 5分"), Some(5));
        assert_eq!(minutes_from_text("no number"), None);
    }

    #[test]
    fn test_three_digit_minutes_never_read_as_trailing_digits() {
        assert_eq!(minutes_from_text("120分"), Some(12));
        assert_eq!(minutes_from_text("run 120 min"), Some(12));
        assert_eq!(minutes_from_text("3行 120分"), Some(3));
    }

    #[test]
    fn test_object_action_coerces_string_minutes() {
        let mut payload = full_payload();
        payload["action"] = json!({ "title": "X", "minutes": "12", "reason": "Y" });
        let action = normalize_reflection(&payload).unwrap().action;
        assert_eq!(action.title, "X");
        assert_eq!(action.minutes, 12);
        assert_eq!(action.reason, "Y");
    }

    #[test]
    fn test_object_action_alternate_keys() {
        let mut payload = full_payload();
        payload["action"] = json!({ "task": "片付け", "duration_minutes": 15, "why": "  すっきり  " });
        let action = normalize_reflection(&payload).unwrap().action;
        assert_eq!(action.title, "片付け");
        assert_eq!(action.minutes, 15);
        assert_eq!(action.reason, "すっきり");
    }

    #[test]
    fn test_unparseable_minutes_default_to_ten() {
        for minutes in [json!("soon"), json!(null), json!(-3), json!({})] {
            let mut payload = full_payload();
            payload["action"] = json!({ "title": "X", "minutes": minutes });
            assert_eq!(normalize_reflection(&payload).unwrap().action.minutes, 10);
        }
    }

    #[test]
    fn test_action_without_title_embeds_payload() {
        let mut payload = full_payload();
        payload["action"] = json!({ "minutes": 10, "reason": "why" });
        match normalize_reflection(&payload).unwrap_err() {
            NormalizationError::ActionFieldsMissing { payload } => {
                assert!(payload.contains("鎖の思考"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_numeric_name_is_coerced_to_string() {
        let mut payload = full_payload();
        payload["positive"]["name"] = json!(7);
        assert_eq!(normalize_reflection(&payload).unwrap().positive.name, "7");
    }

    #[test]
    fn test_self_image_normalization() {
        let ok = normalize_self_image(&json!({ "image_prompt": "p 9:16", "description": "d" }))
            .unwrap();
        assert_eq!(ok.image_prompt, "p 9:16");
        assert_eq!(ok.description, "d");

        let no_desc = normalize_self_image(&json!({ "image_prompt": "p" })).unwrap();
        assert_eq!(no_desc.description, "");

        assert!(normalize_self_image(&json!({ "description": "d" })).is_err());
    }
}
