//! Engine result shapes and text extraction.
//!
//! Engines return either an ordered list of recognition alternatives (each a
//! record with a `text` field, or a bare value) or a single raw value. The
//! extraction rule:
//!
//! 1. non-empty list → first alternative
//!    - record with `text` → that field
//!    - anything else → the alternative, stringified
//! 2. empty list → the whole list, stringified (`"[]"`)
//! 3. single value → stringified
//!
//! Stringifying a JSON string yields the string itself; other values yield
//! their compact JSON text.

use serde_json::{Map, Value};

/// One recognition hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub enum Alternative {
    /// Structured record, normally carrying `text` and optionally `confidence`.
    Record(Map<String, Value>),
    /// Anything that is not a JSON object.
    Value(Value),
}

/// Tagged result of a transcription or punctuation call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutput {
    Alternatives(Vec<Alternative>),
    Value(Value),
}

impl RecognitionOutput {
    /// Normalise an untyped engine result: arrays become alternatives.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => RecognitionOutput::Alternatives(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(map) => Alternative::Record(map),
                        other => Alternative::Value(other),
                    })
                    .collect(),
            ),
            other => RecognitionOutput::Value(other),
        }
    }

    /// Shorthand for the common `[{"text": ...}]` shape.
    pub fn text(text: impl Into<String>) -> Self {
        let mut record = Map::new();
        record.insert("text".into(), Value::String(text.into()));
        RecognitionOutput::Alternatives(vec![Alternative::Record(record)])
    }

    /// Recognised text according to the module-level extraction rule.
    pub fn extract_text(&self) -> String {
        match self {
            RecognitionOutput::Alternatives(alternatives) => match alternatives.first() {
                Some(Alternative::Record(record)) => match record.get("text") {
                    Some(text) => stringify(text),
                    None => stringify(&Value::Object(record.clone())),
                },
                Some(Alternative::Value(value)) => stringify(value),
                None => "[]".to_string(),
            },
            RecognitionOutput::Value(value) => stringify(value),
        }
    }

    /// Best-effort confidence of the first alternative, `0.0` when unavailable.
    pub fn confidence(&self) -> f64 {
        match self {
            RecognitionOutput::Alternatives(alternatives) => match alternatives.first() {
                Some(Alternative::Record(record)) => record
                    .get("confidence")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                _ => 0.0,
            },
            RecognitionOutput::Value(_) => 0.0,
        }
    }

    /// Text to use as punctuated output. An empty list yields `None` so the
    /// caller keeps the unpunctuated text.
    pub fn punctuated_text(&self) -> Option<String> {
        match self {
            RecognitionOutput::Alternatives(alternatives) if alternatives.is_empty() => None,
            _ => Some(self.extract_text()),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
