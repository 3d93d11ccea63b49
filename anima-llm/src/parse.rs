//! Result-typed parsing of model output.
//!
//! Models often wrap JSON in Markdown fences.  These helpers strip them and
//! return [`LlmError::ParseError`] / [`LlmError::SchemaValidation`] instead of
//! panicking, leaving the fallback choice to the call site.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::LlmError;

/// Strip surrounding whitespace and a single layer of Markdown code fences.
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse `raw` (possibly fenced) as JSON into `T`.
///
/// # Errors
///
/// Returns [`LlmError::ParseError`] if the text is not valid JSON for `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let body = strip_code_fences(raw);
    serde_json::from_str(body).map_err(|e| LlmError::ParseError(format!("{e}; raw text: '{}'", preview(body))))
}

/// Parse raw tool-call arguments into a JSON object.
///
/// An empty string is treated as `{}`.
///
/// # Errors
///
/// [`LlmError::ParseError`] for invalid JSON,
/// [`LlmError::SchemaValidation`] if the JSON is not an object.
pub fn parse_tool_arguments(raw: &str) -> Result<Map<String, Value>, LlmError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match parse_json::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(LlmError::SchemaValidation(format!(
            "tool arguments must be an object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(s: &str) -> &str {
    match s.char_indices().nth(120) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImportanceVerdict;

    #[test]
    fn fenced_json_is_unwrapped() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n[1]\n```  "), "[1]");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn verdict_parses_from_fenced_reply() {
        let v: ImportanceVerdict =
            parse_json("```json\n{\"importance_score\": 0.8, \"justification\": \"a death\"}\n```")
                .expect("parse");
        assert!((v.importance_score - 0.8).abs() < f32::EPSILON);
        assert_eq!(v.justification, "a death");
    }

    #[test]
    fn prose_is_a_parse_error() {
        let err = parse_json::<ImportanceVerdict>("I think this is quite important.").expect_err("prose");
        assert!(matches!(err, LlmError::ParseError(_)));
    }

    #[test]
    fn tool_arguments_must_be_an_object() {
        assert!(parse_tool_arguments("").expect("empty").is_empty());
        assert_eq!(
            parse_tool_arguments(r#"{"target_id": "p1"}"#).expect("object")["target_id"],
            "p1"
        );
        assert!(matches!(
            parse_tool_arguments("[1, 2]"),
            Err(LlmError::SchemaValidation(_))
        ));
        assert!(matches!(
            parse_tool_arguments("{not json"),
            Err(LlmError::ParseError(_))
        ));
    }
}
