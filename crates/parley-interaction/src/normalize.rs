//! Backend response normalization.
//!
//! The backend's framing is not statically guaranteed. A body may be:
//! - plain JSON (`{"type": "ai_turn", ...}` or `{"analysis": ...}`)
//! - wrapped as `{"response": "<json string>"}`, possibly with the inner JSON
//!   inside a fenced code block
//! - empty or whitespace, which is a valid no-op
//!
//! All of these collapse into one [`BackendReply`] here.

use crate::error::TransportError;
use parley_core::envelope::{AnalysisResult, BackendEnvelope, BackendReply, PersonaLine};
use parley_core::session::SessionId;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Keys that may carry the backend's session identifier.
const SESSION_ID_KEYS: [&str; 2] = ["conversation_id", "session_id"];

/// Limit on nested `response` / string re-encoding layers.
const MAX_UNWRAP_DEPTH: usize = 4;

const TURN_TYPE: &str = "ai_turn";

/// Normalizes a raw response body.
pub fn normalize(body: &str) -> Result<BackendReply, TransportError> {
    normalize_text(body, 0)
}

fn normalize_text(text: &str, depth: usize) -> Result<BackendReply, TransportError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(BackendReply::new(BackendEnvelope::Empty));
    }

    let value = parse_lenient(trimmed).ok_or_else(|| {
        TransportError::malformed(format!("body is not JSON: {}", preview(trimmed)))
    })?;
    normalize_value(value, depth)
}

fn normalize_value(value: Value, depth: usize) -> Result<BackendReply, TransportError> {
    if depth > MAX_UNWRAP_DEPTH {
        return Err(TransportError::malformed("response is nested too deeply"));
    }

    match value {
        Value::Null => Ok(BackendReply::new(BackendEnvelope::Empty)),
        Value::String(inner) => normalize_text(&inner, depth + 1),
        Value::Object(map) => normalize_object(map, depth),
        other => Err(TransportError::malformed(format!(
            "expected an object, got {}",
            json_type(&other)
        ))),
    }
}

fn normalize_object(mut map: Map<String, Value>, depth: usize) -> Result<BackendReply, TransportError> {
    let session_id = SESSION_ID_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(SessionId::from_json));

    if let Some(inner) = map.remove("response") {
        let mut reply = normalize_value(inner, depth + 1)?;
        if session_id.is_some() {
            reply.session_id = session_id;
        }
        return Ok(reply);
    }

    let analysis = map
        .remove("analysis")
        .filter(|v| !v.is_null())
        .map(AnalysisResult::new);
    let kind = map
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned);

    let envelope = if map.contains_key("messages") || kind.as_deref() == Some(TURN_TYPE) {
        if let Some(kind) = kind.filter(|k| k != TURN_TYPE) {
            return Err(TransportError::malformed(format!(
                "unexpected envelope type '{kind}'"
            )));
        }
        let messages = match map.remove("messages") {
            Some(value) => parse_messages(value)?,
            None => Vec::new(),
        };
        BackendEnvelope::Turn {
            messages,
            closing: analysis,
        }
    } else if let Some(analysis) = analysis {
        BackendEnvelope::Analysis(analysis)
    } else if session_id.is_some() {
        BackendEnvelope::Empty
    } else {
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        return Err(TransportError::malformed(format!(
            "no recognized envelope keys (found: {})",
            keys.join(", ")
        )));
    };

    Ok(BackendReply {
        session_id,
        envelope,
    })
}

fn parse_messages(value: Value) -> Result<Vec<PersonaLine>, TransportError> {
    serde_json::from_value(value)
        .map_err(|e| TransportError::malformed(format!("invalid turn messages: {e}")))
}

/// Parses JSON directly, falling back to fenced code blocks.
fn parse_lenient(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok().or_else(|| parse_fenced(text))
}

/// Matches a fence opener with an optional language tag (`json`, ...).
static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("valid fence regex"));

/// Parses the first complete JSON value following a fence opener.
///
/// The value ends where the JSON parser says it does, so backticks inside
/// string literals never close the block early.
fn parse_fenced(text: &str) -> Option<Value> {
    FENCE_OPEN
        .find_iter(text)
        .find_map(|fence| first_json_value(&text[fence.end()..]))
}

fn first_json_value(text: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()?
        .ok()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn turn_body() -> Value {
        json!({
            "type": "ai_turn",
            "messages": [
                {"character": "Sara", "content": "Hello!"},
                {"character": "Ali", "content": "Welcome."}
            ]
        })
    }

    fn expected_turn() -> BackendEnvelope {
        BackendEnvelope::turn(vec![
            PersonaLine::new("Sara", "Hello!"),
            PersonaLine::new("Ali", "Welcome."),
        ])
    }

    #[test]
    fn plain_turn() {
        let reply = normalize(&turn_body().to_string()).unwrap();
        assert_eq!(reply.envelope, expected_turn());
        assert_eq!(reply.session_id, None);
    }

    #[test]
    fn fenced_response_parses_like_plain_json() {
        let plain = normalize(&turn_body().to_string()).unwrap();

        let fenced = format!("```json\n{}\n```", turn_body());
        let wrapped = json!({ "response": fenced }).to_string();
        let unwrapped = normalize(&wrapped).unwrap();

        assert_eq!(unwrapped, plain);
    }

    #[test]
    fn fenced_content_may_contain_backticks() {
        let body = json!({
            "type": "ai_turn",
            "messages": [{"character": "Sara", "content": "Try writing ```print(1)``` here"}]
        });
        let plain = normalize(&body.to_string()).unwrap();

        let fenced = format!("```json\n{body}\n```");
        let wrapped = json!({ "response": fenced }).to_string();

        assert_eq!(normalize(&wrapped).unwrap(), plain);
        assert_eq!(normalize(&fenced).unwrap(), plain);
    }

    #[test]
    fn json_encoded_string_response() {
        let wrapped = json!({ "response": turn_body().to_string() }).to_string();
        assert_eq!(normalize(&wrapped).unwrap().envelope, expected_turn());
    }

    #[test]
    fn response_object_is_used_directly() {
        let wrapped = json!({ "conversation_id": 12, "response": turn_body() }).to_string();
        let reply = normalize(&wrapped).unwrap();
        assert_eq!(reply.envelope, expected_turn());
        assert_eq!(reply.session_id, Some(SessionId::from(12_i64)));
    }

    #[test]
    fn fenced_block_with_surrounding_prose() {
        let body = format!("Here you go:\n```\n{}\n```\nthanks", turn_body());
        assert_eq!(normalize(&body).unwrap().envelope, expected_turn());
    }

    #[test]
    fn analysis_is_passed_through_verbatim() {
        let result = json!({"score": 4, "notes": ["listens well"], "nested": {"x": null}});
        let body = json!({ "analysis": result.clone() }).to_string();

        match normalize(&body).unwrap().envelope {
            BackendEnvelope::Analysis(analysis) => assert_eq!(analysis.into_inner(), result),
            other => panic!("expected analysis, got {other:?}"),
        }
    }

    #[test]
    fn turn_with_analysis_is_a_closing_turn() {
        let body = json!({
            "type": "ai_turn",
            "messages": [{"character": "Sara", "content": "Thanks for your time."}],
            "analysis": {"score": 3}
        })
        .to_string();

        let envelope = normalize(&body).unwrap().envelope;
        assert!(matches!(envelope, BackendEnvelope::Turn { closing: Some(_), .. }));
    }

    #[test]
    fn blank_bodies_are_empty() {
        assert_eq!(normalize("").unwrap().envelope, BackendEnvelope::Empty);
        assert_eq!(normalize("  \n\t").unwrap().envelope, BackendEnvelope::Empty);
        assert_eq!(
            normalize(r#"{"response": ""}"#).unwrap().envelope,
            BackendEnvelope::Empty
        );
    }

    #[test]
    fn session_only_start_ack_is_empty() {
        let reply = normalize(r#"{"conversation_id": "c-1"}"#).unwrap();
        assert_eq!(reply.envelope, BackendEnvelope::Empty);
        assert_eq!(reply.session_id, Some(SessionId::Text("c-1".into())));
    }

    #[test]
    fn outer_session_id_wins_over_inner() {
        let inner = json!({"session_id": 2, "type": "ai_turn", "messages": []}).to_string();
        let body = json!({"conversation_id": 1, "response": inner}).to_string();
        assert_eq!(normalize(&body).unwrap().session_id, Some(SessionId::from(1_i64)));
    }

    #[test]
    fn unrecognized_shapes_are_malformed() {
        for body in [
            "not json at all",
            r#"{"unexpected": true}"#,
            "[1, 2, 3]",
            r#"{"type": "tool_call", "messages": []}"#,
            r#"{"messages": [{"character": "Sara"}]}"#,
            "```json\n{broken\n```",
        ] {
            let err = normalize(body).unwrap_err();
            assert!(
                matches!(err, TransportError::MalformedResponse(_)),
                "{body} -> {err:?}"
            );
        }
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let mut body = turn_body();
        for _ in 0..8 {
            body = json!({ "response": body.to_string() });
        }
        assert!(normalize(&body.to_string()).is_err());
    }
}
