//! Content-Type validation for request bodies

use axum::{
    body::HttpBody,
    extract::Request,
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};

use crate::error::{ApiError, ApiResult};

/// Reject POST/PUT/PATCH requests carrying a non-JSON body with 415
///
/// Bodiless requests (for example `POST .../cancel`) pass through.
pub async fn require_json_content_type(request: Request, next: Next) -> ApiResult<Response> {
    let carries_body = matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH)
        && has_body(&request);

    if carries_body && !is_json(request.headers()) {
        let found = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none")
            .to_string();
        return Err(ApiError::UnsupportedMediaType(format!(
            "Expected application/json request body, got {}",
            found
        )));
    }

    Ok(next.run(request).await)
}

fn has_body(request: &Request) -> bool {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    match declared {
        Some(len) => len > 0,
        None => {
            request.headers().contains_key(header::TRANSFER_ENCODING)
                || request.body().size_hint().exact() != Some(0)
        }
    }
}

/// `application/json`, or any `+json` structured syntax suffix
pub fn is_json(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}
