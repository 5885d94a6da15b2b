//! Administration endpoints
//!
//! Every route here sits behind `auth_middleware` + `require_admin`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, patch},
    Json, Router,
};
use serde::Deserialize;
use tenx_common::auth::Role;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, require_admin, ApiJson};
use crate::models::{
    non_blank, AdminStats, ApprovalRequest, ApprovalStatus, AuthUser, CardFeature, UpdateRoleRequest, User,
};
use crate::pagination::{Page, PageParams};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Page<User>>> {
    let search = non_blank(query.search.as_deref());

    let total = db::users::count_users(&state.db, search.as_deref()).await?;
    let pagination = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(total);
    let data = db::users::list_users(&state.db, search.as_deref(), pagination.limit, pagination.offset).await?;

    Ok(Json(Page::new(data, pagination, total)))
}

/// PATCH /api/admin/users/:id/role
pub async fn update_user_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateRoleRequest>,
) -> ApiResult<Json<User>> {
    if id == caller.id && request.role != Role::Admin {
        return Err(ApiError::Conflict("Administrators cannot demote themselves".to_string()));
    }

    let user = db::users::set_role(&state.db, id, request.role)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;

    tracing::info!(user_id = %id, role = request.role.as_str(), by = %caller.id, "User role changed");
    Ok(Json(user))
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if id == caller.id {
        return Err(ApiError::Conflict("Administrators cannot delete their own account".to_string()));
    }

    if !db::users::delete_user(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("User {} not found", id)));
    }

    tracing::warn!(user_id = %id, by = %caller.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/card-features/pending
pub async fn list_pending(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<CardFeature>>> {
    let total = db::card_features::count_pending(&state.db).await?;
    let pagination = params.resolve(total);
    let data = db::card_features::list_pending(&state.db, pagination.limit, pagination.offset).await?;

    Ok(Json(Page::new(data, pagination, total)))
}

/// PATCH /api/admin/card-features/:id/approval
pub async fn set_approval(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<ApprovalRequest>,
) -> ApiResult<Json<CardFeature>> {
    if request.status == ApprovalStatus::Pending {
        return Err(ApiError::field("status", "must be approved or rejected"));
    }

    let card = db::card_features::set_approval(&state.db, id, request.status)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Card feature {} not found", id)))?;

    tracing::info!(card_id = %id, status = request.status.as_str(), by = %caller.id, "Moderation decision");
    Ok(Json(card))
}

/// GET /api/admin/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<AdminStats>> {
    Ok(Json(db::stats::admin_stats(&state.db).await?))
}

/// Build admin routes
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id/role", patch(update_user_role))
        .route("/api/admin/users/:id", delete(delete_user))
        .route("/api/admin/card-features/pending", get(list_pending))
        .route("/api/admin/card-features/:id/approval", patch(set_approval))
        .route("/api/admin/stats", get(stats))
        // Layers run bottom-up: authenticate, then check the role
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
