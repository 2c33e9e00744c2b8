//! Prompt templates for the text and image generators.
//!
//! Every image prompt built here embeds [`ASPECT_RATIO`]; the image generator and
//! the card layout both assume portrait 9:16 output.

pub const ASPECT_RATIO: &str = "9:16";

const DEFAULT_EMOTION: &str = "anxiety";
const DEFAULT_THEME: &str = "hope";

/// Which side of the card an image prompt is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSide {
    Negative,
    Positive,
}

impl PromptSide {
    pub fn build(self, tag: &str) -> String {
        match self {
            PromptSide::Negative => negative_prompt(tag),
            PromptSide::Positive => positive_prompt(tag),
        }
    }
}

fn tag_or<'a>(tag: &'a str, default: &'a str) -> &'a str {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        default
    } else {
        trimmed
    }
}

pub fn negative_prompt(emotion: &str) -> String {
    format!(
        "Hand-drawn illustration, modern/anime-inspired style, central symbolic scene that makes \
         the anxiety readable (visual metaphors for {}), slightly dark but cute and approachable \
         mood (about 0.85), soft dark base with gentle contrast, painterly shading, {} aspect \
         ratio, highly detailed, no text, no letters, no typography, minimal card framing, \
         pop-art color pops, silhouettes or human shadow allowed.",
        tag_or(emotion, DEFAULT_EMOTION),
        ASPECT_RATIO
    )
}

pub fn positive_prompt(theme: &str) -> String {
    format!(
        "Hand-drawn illustration, modern/anime-inspired style, central symbolic scene that \
         embodies {}, brighter and cuter mood (about 1.15), soft light palette with airy \
         highlights, gentle glow, painterly shading, {} aspect ratio, highly detailed, no text, \
         no letters, no typography, minimal card framing.",
        tag_or(theme, DEFAULT_THEME),
        ASPECT_RATIO
    )
}

/// Image prompt for a calendar task, derived from the user's own words.
pub fn task_prompt(side: PromptSide, anxiety_text: &str) -> String {
    let text = anxiety_text.trim();
    match side {
        PromptSide::Negative => negative_prompt(text),
        PromptSide::Positive if text.is_empty() => positive_prompt(""),
        PromptSide::Positive => positive_prompt(&format!("relief from {text}")),
    }
}

/// Instruction sent to the text generator for a new card.
pub fn reflection_prompt(anxiety_text: &str) -> String {
    format!(
        r#"You are generating JSON for a Japanese tarot-style reflection app. Return ONLY valid JSON. No extra text.

Given the anxiety text, generate negative card, positive card, and a concrete action. Also generate image prompts for Imagen using the provided templates.
Rules:
- Output must match the JSON schema exactly:
  {{"negative": {{"name", "keywords", "interpretation", "emotion", "image_prompt"}},
    "positive": {{"name", "keywords", "interpretation", "theme", "image_prompt"}},
    "action": {{"title", "minutes", "reason"}},
    "meta": {{"language", "safety": {{"self_harm", "medical"}}}}}}
- Card names: 2-10 Japanese chars, avoid existing tarot names.
- keywords: exactly 2 entries, 2-6 Japanese chars each.
- interpretation: 30-80 Japanese chars, non-blaming tone.
- emotion/theme: short English phrase (1-3 words).
- action: concrete, 10-15 minutes, no abstract advice.
- action.title: short and clearly understandable. Must be title-only (no detail text).
- action.reason: write the detail (separate from title).
- action.minutes: required (10-15).
- image_prompt: long-form prompt containing "{ratio}"; follow style rules.
- No self-harm advice. If user mentions self-harm, set meta.safety.self_harm=true and provide gentle non-medical action.

Templates:
Negative:
{negative}

Positive:
{positive}

Anxiety text:
{anxiety_text}"#,
        ratio = ASPECT_RATIO,
        negative = negative_prompt("{emotion}"),
        positive = positive_prompt("{positive_theme}"),
        anxiety_text = anxiety_text,
    )
}

/// Instruction for summarizing a user's recent cards into one illustration.
pub fn self_image_prompt(summary: &str) -> String {
    format!(
        r#"You are summarizing a person's recent emotional pattern for an illustrated self-portrait. Return ONLY valid JSON. No extra text.

Schema: {{"image_prompt": string, "description": string}}
Rules:
- image_prompt: English, long-form, symbolic (no literal faces), hand-drawn anime-inspired style, must contain "{ratio}" aspect ratio, no text or letters.
- description: 60-120 Japanese chars, gentle and non-judgmental, describing the current state and the direction it is moving.

Recent cards (newest first):
{summary}"#,
        ratio = ASPECT_RATIO,
        summary = summary,
    )
}
