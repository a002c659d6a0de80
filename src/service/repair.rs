//! JSON repair for LLM responses
//!
//! Model output frequently arrives as almost-JSON: fenced in markdown,
//! wrapped in prose, carrying trailing commas or line comments, or with
//! commas dropped between properties. The passes here are ordered from
//! least to most invasive and every pass is a no-op on already valid
//! JSON.

use regex::Regex;
use serde_json::Value;

/// Result of attempting to obtain JSON from a raw response.
#[derive(Debug)]
pub enum RepairOutcome {
    /// The raw response parsed as-is.
    Parsed(Value),
    /// The response parsed after one or more repair passes.
    Repaired(Value),
    /// No pass produced parseable JSON; carries the best cleaned text.
    Failed(String),
}

impl RepairOutcome {
    pub fn into_value(self) -> Option<Value> {
        match self {
            RepairOutcome::Parsed(v) | RepairOutcome::Repaired(v) => Some(v),
            RepairOutcome::Failed(_) => None,
        }
    }
}

/// Parse a raw LLM response, escalating through the repair passes.
pub fn parse_or_repair(raw: &str) -> RepairOutcome {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return RepairOutcome::Parsed(value);
    }

    let cleaned = clean_response(raw);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        tracing::warn!("Response required cleaning before parsing");
        return RepairOutcome::Repaired(value);
    }

    let fixed = insert_missing_commas(&cleaned);
    if let Ok(value) = serde_json::from_str::<Value>(&fixed) {
        tracing::warn!("Response required comma insertion before parsing");
        return RepairOutcome::Repaired(value);
    }

    tracing::error!(
        length = cleaned.len(),
        "Response could not be repaired into JSON"
    );
    RepairOutcome::Failed(cleaned)
}

/// The conservative passes: strip markdown fences, trim to the outermost
/// JSON delimiters, drop trailing commas, strip line comments.
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.replace("```json", "").replace("```", "");
    text = text.trim().to_string();

    if text
        .chars()
        .next()
        .map(|c| c != '{' && c != '[')
        .unwrap_or(false)
    {
        if let Some(start) = text.find('{') {
            text = text[start..].to_string();
        }
    }
    if text
        .chars()
        .last()
        .map(|c| c != '}' && c != ']')
        .unwrap_or(false)
    {
        if let Some(end) = text.rfind('}') {
            text.truncate(end + 1);
        }
    }

    text = text.replace(",}", "}").replace(",]", "]");

    let comments = Regex::new(r"//[^\n]*\n").unwrap();
    comments.replace_all(&text, "\n").into_owned()
}

/// The invasive pass: re-insert commas the model dropped between string
/// properties, objects and arrays separated by newlines.
pub fn insert_missing_commas(text: &str) -> String {
    let between_strings = Regex::new(r#""\s*\n\s*""#).unwrap();
    let fixed = between_strings.replace_all(text, "\",\n\"").into_owned();

    let between_objects = Regex::new(r"\}\s*\n\s*\{").unwrap();
    let fixed = between_objects.replace_all(&fixed, "},\n{").into_owned();

    let between_arrays = Regex::new(r"\]\s*\n\s*\[").unwrap();
    between_arrays.replace_all(&fixed, "],\n[").into_owned()
}
