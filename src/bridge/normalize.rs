//! Normalization of raw tool results into text segments.
//!
//! Total over every input shape: string, object, array, number, null.
//! The model only consumes text, so whatever the tool service returns is
//! reduced to an ordered list of text segments, worst case a JSON dump of
//! the whole result.

use crate::models::TextSegment;
use serde_json::Value;

use super::first_present;

/// Fields probed, in order, when the result carries no content-segment
/// list. Both spellings of the structured-content field occur in the wild.
const FALLBACK_FIELDS: &[&str] = &["data", "structuredContent", "structured_content", "content"];

/// Reduce a raw tool result to at least one text segment. Never fails.
pub fn to_segments(raw: &Value) -> Vec<TextSegment> {
    let mut segments: Vec<TextSegment> = Vec::new();

    if let Some(items) = raw.get("content").and_then(Value::as_array) {
        for item in items {
            segments.push(to_text_segment(item));
        }
    }

    if segments.is_empty() {
        let payload = first_present(raw, FALLBACK_FIELDS).unwrap_or(raw);
        segments.push(TextSegment::text(render(payload)));
    }

    segments
}

/// One content-list entry to a text segment. A segment already tagged as
/// text passes its payload through; anything else is rendered.
fn to_text_segment(segment: &Value) -> TextSegment {
    if let Some(map) = segment.as_object() {
        if map.get("type").and_then(Value::as_str) == Some("text") {
            if let Some(text) = map.get("text") {
                return TextSegment::text(render(text));
            }
        }
    }
    TextSegment::text(render(segment))
}

/// Plain strings stay unquoted; everything else becomes compact JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
