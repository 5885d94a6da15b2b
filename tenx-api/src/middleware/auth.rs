//! Bearer token authentication
//!
//! The token only identifies the caller. Email, name and role are read from
//! the `users` row on every request, so a demotion or deletion takes effect
//! immediately.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tenx_common::auth::decode_token;

use crate::error::{ApiError, ApiResult};
use crate::models::AuthUser;
use crate::AppState;

/// Require a valid bearer token
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(request.headers())?
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
    let user = authenticate(&state, &token).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Authenticate when a token is present; anonymous requests pass through
///
/// A token that is present but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    if let Some(token) = bearer_token(request.headers())? {
        let user = authenticate(&state, &token).await?;
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// Reject non-admin callers; must run inside [`auth_middleware`]
pub async fn require_admin(request: Request, next: Next) -> ApiResult<Response> {
    match request.extensions().get::<AuthUser>() {
        Some(user) if user.is_admin() => Ok(next.run(request).await),
        Some(user) => {
            tracing::warn!(user_id = %user.id, path = %request.uri().path(), "Admin route denied");
            Err(ApiError::Forbidden("Administrator role required".to_string()))
        }
        None => Err(ApiError::Unauthorized("Authentication required".to_string())),
    }
}

/// Token from `Authorization: Bearer <token>`
///
/// `Ok(None)` when the header is absent, `Err` when it is present but not a
/// bearer credential.
fn bearer_token(headers: &HeaderMap) -> ApiResult<Option<String>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Malformed Authorization header".to_string()))?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| ApiError::Unauthorized("Malformed Authorization header".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(ApiError::Unauthorized("Expected a bearer token".to_string()));
    }
    Ok(Some(token.trim().to_string()))
}

async fn authenticate(state: &AppState, token: &str) -> ApiResult<AuthUser> {
    let now = chrono::Utc::now().timestamp();
    let claims = decode_token(token, &state.jwt_secret, now).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::Unauthorized("Invalid or expired token".to_string())
    })?;

    let user = crate::db::users::get_user(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(AuthUser::from(&user))
}

// ========================================
// Extractors
// ========================================

/// Caller identity set by one of the auth middlewares; 401 when anonymous
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

/// Authenticated administrator; 401 when anonymous, 403 otherwise
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Administrator role required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
