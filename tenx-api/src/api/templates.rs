//! Project template endpoints
//!
//! Anyone may browse; only administrators curate.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{optional_auth_middleware, AdminUser, ApiJson};
use crate::models::{non_blank, CreateTemplateRequest, Template, TemplateQuery, UpdateTemplateRequest};
use crate::pagination::{Page, PageParams};
use crate::AppState;

/// GET /api/templates
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> ApiResult<Json<Page<Template>>> {
    let search = non_blank(query.search.as_deref());
    let category = non_blank(query.category.as_deref());

    let total = db::templates::count_templates(&state.db, search.as_deref(), category.as_deref()).await?;
    let pagination = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(total);
    let data = db::templates::list_templates(
        &state.db,
        search.as_deref(),
        category.as_deref(),
        pagination.limit,
        pagination.offset,
    )
    .await?;

    Ok(Json(Page::new(data, pagination, total)))
}

/// GET /api/templates/:id
pub async fn get_template(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Template>> {
    Ok(Json(load(&state, id).await?))
}

/// POST /api/templates
pub async fn create_template(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    request.validate()?;

    let template = request.into_template(admin.id);
    db::templates::insert_template(&state.db, &template).await?;

    tracing::info!(template_id = %template.id, "Template created");
    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /api/templates/:id
pub async fn update_template(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateTemplateRequest>,
) -> ApiResult<Json<Template>> {
    let mut template = load(&state, id).await?;
    request.validate()?;

    request.apply(&mut template);
    db::templates::update_template(&state.db, &template).await?;
    Ok(Json(template))
}

/// DELETE /api/templates/:id
pub async fn delete_template(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !db::templates::delete_template(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Template {} not found", id)));
    }
    tracing::info!(template_id = %id, "Template deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<Template> {
    db::templates::get_template(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Template {} not found", id)))
}

/// Build template routes
pub fn template_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/templates", get(list_templates).post(create_template))
        .route(
            "/api/templates/:id",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route_layer(middleware::from_fn_with_state(state, optional_auth_middleware))
}
