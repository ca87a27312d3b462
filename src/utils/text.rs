//! Text Helpers
//!
//! Cleanup applied to model output before it is parsed or handed on:
//! code-fence removal, reasoning-tag removal, and tolerant JSON object parsing.

use serde_json::{Map, Value};

use agent_m_core::split_reasoning;

const FENCE: &str = "```";

/// Remove one wrapping ```` ``` ```` or ```` ```json ```` fence.
///
/// Text that does not start with a fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix(FENCE) else {
        return trimmed.to_string();
    };

    // Skip optional language identifier
    let body = after_open
        .strip_prefix("json")
        .or_else(|| after_open.strip_prefix("JSON"))
        .unwrap_or(after_open)
        .trim_start();

    body.trim_end()
        .strip_suffix(FENCE)
        .unwrap_or(body)
        .trim()
        .to_string()
}

/// Drop everything inside `<think>`...`</think>` and return the trimmed answer text.
///
/// An unterminated reasoning section swallows the rest of the text.
pub fn strip_reasoning(text: &str) -> String {
    let (_, content) = split_reasoning(text);
    content.trim().to_string()
}

/// Strip reasoning and fences, then parse a JSON object.
///
/// Returns `None` for anything that is not a JSON object. When the cleaned text
/// does not parse as a whole, the outermost `{`...`}` span is tried as well.
pub fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_code_fence(&strip_reasoning(text));
    if cleaned.is_empty() {
        return None;
    }

    let parsed = serde_json::from_str::<Value>(&cleaned).ok().or_else(|| {
        let start = cleaned.find('{')?;
        let end = cleaned.rfind('}')?;
        if start < end {
            serde_json::from_str::<Value>(&cleaned[start..=end]).ok()
        } else {
            None
        }
    })?;

    match parsed {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Non-empty trimmed string value for `key`, if present.
pub fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
