//! JSON input sanitization
//!
//! String values (and object keys) lose ASCII control characters other than
//! tab, newline and carriage return. Bodies nested deeper than
//! [`MAX_JSON_DEPTH`] are rejected. Bodies that are not valid JSON pass
//! through untouched so the extractor reports the syntax error.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};

use super::content_type::is_json;
use crate::error::{ApiError, ApiResult};

/// Deepest accepted container nesting
pub const MAX_JSON_DEPTH: usize = 32;

pub async fn sanitize_json_body(request: Request, next: Next) -> ApiResult<Response> {
    if !is_json(request.headers()) {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.map_err(|e| {
        if is_length_limit(&e) {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(format!("Failed to read request body: {}", e))
        }
    })?;

    let bytes = match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => {
            if depth(&value) > MAX_JSON_DEPTH {
                return Err(ApiError::BadRequest(format!(
                    "JSON nesting exceeds {} levels",
                    MAX_JSON_DEPTH
                )));
            }
            let cleaned = sanitize_value(value);
            Bytes::from(serde_json::to_vec(&cleaned).map_err(|e| ApiError::Internal(e.to_string()))?)
        }
        Err(_) => bytes,
    };

    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Container nesting depth; scalars are 0
pub fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_control_chars(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (strip_control_chars(&k), sanitize_value(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

pub fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_ascii_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}
