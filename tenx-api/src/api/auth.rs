//! Account registration, login and profile endpoints

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use tenx_common::auth::{encode_token, hash_password, verify_password, verify_without_account, Claims, Role};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, ApiJson};
use crate::models::{AuthResponse, AuthUser, LoginRequest, RegisterRequest, UpdateProfileRequest, User};
use crate::validation::normalize_email;
use crate::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    request.validate()?;

    let email = normalize_email(&request.email);
    if db::users::email_exists(&state.db, &email).await? {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

    let role = if state.config.auth.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        name: request.name.trim().to_string(),
        role,
        created_at: now,
        updated_at: now,
    };

    let password_hash = hash_blocking(request.password).await?;
    db::users::insert_user(&state.db, &user, &password_hash).await?;

    tracing::info!(user_id = %user.id, role = role.as_str(), "Account registered");
    let token = issue_token(&state, &user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /api/auth/login
///
/// Unknown email and wrong password produce the same response.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = normalize_email(&request.email);
    let password = request.password;
    let Some((user, stored_hash)) = db::users::get_user_with_hash(&state.db, &email).await? else {
        tracing::debug!("Login for unknown email");
        tokio::task::spawn_blocking(move || verify_without_account(&password))
            .await
            .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))?;
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))?;
    if !valid {
        tracing::info!(user_id = %user.id, "Login with wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let token = issue_token(&state, &user)?;
    Ok(Json(AuthResponse { token, user }))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<User>> {
    let user = db::users::get_user(&state.db, caller.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;
    Ok(Json(user))
}

/// PUT /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    request.validate()?;

    let password_hash = match request.password {
        Some(password) => Some(hash_blocking(password).await?),
        None => None,
    };
    let name = request.name.as_deref().map(str::trim);

    let user = db::users::update_profile(&state.db, caller.id, name, password_hash.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

fn issue_token(state: &AppState, user: &User) -> ApiResult<String> {
    let claims = Claims::new(
        user.id,
        user.email.clone(),
        user.role,
        Utc::now().timestamp(),
        state.config.auth.token_ttl_secs,
    );
    encode_token(&claims, &state.jwt_secret).map_err(|e| ApiError::Internal(e.to_string()))
}

async fn hash_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Build account routes
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login));

    let authenticated = Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/users/me", put(update_me))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    public.merge(authenticated)
}
