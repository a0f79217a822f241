//! Turning raw model output into a predicted [`Record`].
//!
//! The endpoint answers `{"value": ...}`. A string value is free text that
//! should contain one JSON object, possibly wrapped in prose or code fences;
//! an object value is used directly.

use docscore_core::{Record, json_type_name};
use serde_json::Value;
use thiserror::Error;

/// Placeholder raw text when the endpoint returned nothing usable.
pub const NOT_AVAILABLE: &str = "NotAvail";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response has no `value` key")]
    MissingValue,
    #[error("no JSON object found in model output")]
    NoObject,
    #[error("model output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model output must be a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Parse the endpoint's response body.
pub fn parse_response(body: &Value) -> Result<Record, ParseError> {
    let value = body.get("value").ok_or(ParseError::MissingValue)?;
    parse_prediction(value)
}

/// Parse a `value` payload into a record.
pub fn parse_prediction(value: &Value) -> Result<Record, ParseError> {
    match value {
        Value::Object(object) => Ok(Record::from_prediction(object.clone())),
        Value::String(text) => {
            let block = extract_object(text).ok_or(ParseError::NoObject)?;
            let parsed: Value = match serde_json::from_str(block) {
                Ok(parsed) => parsed,
                // Models often answer with Python-style dict literals.
                Err(strict) => serde_json::from_str(&relaxed_json(block))
                    .map_err(|_| ParseError::Json(strict))?,
            };
            match parsed {
                Value::Object(object) => Ok(Record::from_prediction(object)),
                other => Err(ParseError::NotAnObject(json_type_name(&other))),
            }
        }
        other => Err(ParseError::NotAnObject(json_type_name(other))),
    }
}

/// Raw text to keep for a failed prediction: the `value` when present.
pub fn raw_value(body: &Value) -> String {
    match body.get("value") {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Outermost `{ ... }` span: first `{` through last `}`.
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Rewrite a Python dict literal into JSON: single-quoted strings become
/// double-quoted, `True`/`False`/`None` become `true`/`false`/`null`, and
/// trailing commas are dropped.
fn relaxed_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                let quote = c;
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(escaped) => {
                                out.push('\\');
                                out.push(escaped);
                            }
                            None => out.push_str("\\\\"),
                        },
                        '"' if quote == '\'' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        c if c == quote => break,
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            ',' => {
                let mut rest = chars.clone();
                while rest.next_if(|c| c.is_whitespace()).is_some() {}
                if !matches!(rest.peek(), Some('}' | ']')) {
                    out.push(',');
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(c) = chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_') {
                    word.push(c);
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => word.as_str(),
                });
            }
            c => out.push(c),
        }
    }
    out
}
