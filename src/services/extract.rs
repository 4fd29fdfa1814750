// src/services/extract.rs
//! Recovers structured data from free-form model output.
//!
//! Models wrap JSON in prose or markdown fences even when asked not to, so
//! three readings are tried in order and the first that parses wins:
//! the whole text, the inside of the first fenced block, and the span from
//! the first `{` to the last `}`.
use crate::errors::{ShotlistError, Stage};
use crate::models::{PromptBatch, RevisedPrompt, VisualStyleCues};
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

const FENCE: &str = "```";

/// Post-parse checks on a model result.
pub trait Validate {
    fn validate(&self, stage: Stage) -> Result<(), ShotlistError>;
}

pub fn extract_value(raw: &str, stage: Stage) -> Result<Value, ShotlistError> {
    let text = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    if let Some(inner) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            return Ok(value);
        }
    }

    if let Some(span) = brace_span(text) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return Ok(value);
        }
    }

    Err(ShotlistError::Parse { stage })
}

/// Extract and convert to `T`. A value that parses but has the wrong shape
/// is a `Schema` error, not a `Parse` error.
pub fn extract<T: DeserializeOwned>(raw: &str, stage: Stage) -> Result<T, ShotlistError> {
    let value = extract_value(raw, stage)?;
    serde_json::from_value(value).map_err(|e| ShotlistError::Schema {
        stage,
        reason: e.to_string(),
    })
}

pub fn extract_checked<T: DeserializeOwned + Validate>(
    raw: &str,
    stage: Stage,
) -> Result<T, ShotlistError> {
    let parsed: T = extract(raw, stage)?;
    parsed.validate(stage)?;
    Ok(parsed)
}

/// Interior of the first fenced block, without an optional `json` tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after = &text[open + FENCE.len()..];
    let close = after.find(FENCE)?;
    let inner = &after[..close];
    Some(
        inner
            .strip_prefix("json")
            .or_else(|| inner.strip_prefix("JSON"))
            .unwrap_or(inner),
    )
}

// Greedy on purpose: first `{` to last `}`, no brace balancing.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl Validate for VisualStyleCues {
    fn validate(&self, stage: Stage) -> Result<(), ShotlistError> {
        let schema = |reason: String| ShotlistError::Schema { stage, reason };

        if self.description.trim().is_empty() {
            return Err(schema("description is empty".to_string()));
        }
        if self.hex_palette.len() != 5 {
            return Err(schema(format!(
                "expected 5 palette colors, got {}",
                self.hex_palette.len()
            )));
        }
        if let Some(bad) = self.hex_palette.iter().find(|c| !is_hex_color(c)) {
            return Err(schema(format!("'{}' is not a #RRGGBB color", bad)));
        }
        if self.keywords.is_empty() {
            return Err(schema("keyword list is empty".to_string()));
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(schema("keyword list contains a blank phrase".to_string()));
        }
        if !(6..=10).contains(&self.keywords.len()) {
            warn!(
                "{} returned {} keyword phrases, expected 6-10",
                stage,
                self.keywords.len()
            );
        }
        Ok(())
    }
}

impl Validate for PromptBatch {
    fn validate(&self, stage: Stage) -> Result<(), ShotlistError> {
        if self.prompts.is_empty() {
            return Err(ShotlistError::EmptyResult {
                stage,
                reason: "the prompt list is empty".to_string(),
            });
        }
        for (index, entry) in self.prompts.iter().enumerate() {
            if entry.label.trim().is_empty() || entry.prompt.trim().is_empty() {
                return Err(ShotlistError::Schema {
                    stage,
                    reason: format!("prompt {} has a blank label or prompt text", index + 1),
                });
            }
        }
        Ok(())
    }
}

impl Validate for RevisedPrompt {
    fn validate(&self, stage: Stage) -> Result<(), ShotlistError> {
        if self.prompt.trim().is_empty() {
            return Err(ShotlistError::EmptyResult {
                stage,
                reason: "the revised prompt is empty".to_string(),
            });
        }
        Ok(())
    }
}
