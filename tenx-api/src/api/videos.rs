//! Video endpoints

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
use crate::middleware::{optional_auth_middleware, ApiJson};
use crate::models::{non_blank, AuthUser, CreateVideoRequest, UpdateVideoRequest, Video, VideoQuery};
use crate::pagination::{Page, PageParams};
use crate::AppState;

/// GET /api/videos
pub async fn list_videos(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> ApiResult<Json<Page<Video>>> {
    let search = non_blank(query.search.as_deref());
    let category = non_blank(query.category.as_deref());

    let total = db::videos::count_videos(&state.db, search.as_deref(), category.as_deref()).await?;
    let pagination = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(total);
    let data = db::videos::list_videos(
        &state.db,
        search.as_deref(),
        category.as_deref(),
        pagination.limit,
        pagination.offset,
    )
    .await?;

    Ok(Json(Page::new(data, pagination, total)))
}

/// GET /api/videos/:id
pub async fn get_video(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Video>> {
    Ok(Json(load(&state, id).await?))
}

/// POST /api/videos
pub async fn create_video(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<CreateVideoRequest>,
) -> ApiResult<(StatusCode, Json<Video>)> {
    let youtube_id = request.validate()?;
    if let Some(card_id) = request.card_feature_id {
        ensure_card_exists(&state, card_id).await?;
    }

    let video = request.into_video(youtube_id, caller.id);
    db::videos::insert_video(&state.db, &video).await?;

    tracing::info!(video_id = %video.id, youtube_id = %video.youtube_id, "Video created");
    Ok((StatusCode::CREATED, Json(video)))
}

/// PUT /api/videos/:id
pub async fn update_video(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateVideoRequest>,
) -> ApiResult<Json<Video>> {
    let mut video = load(&state, id).await?;
    if !caller.can_manage(video.created_by) {
        return Err(ApiError::Forbidden("Only the owner can edit this video".to_string()));
    }

    let youtube_id = request.validate()?;
    if let Some(Some(card_id)) = request.card_feature_id {
        ensure_card_exists(&state, card_id).await?;
    }

    request.apply(&mut video, youtube_id);
    db::videos::update_video(&state.db, &video).await?;
    Ok(Json(video))
}

/// DELETE /api/videos/:id
pub async fn delete_video(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let video = load(&state, id).await?;
    if !caller.can_manage(video.created_by) {
        return Err(ApiError::Forbidden("Only the owner can delete this video".to_string()));
    }

    db::videos::delete_video(&state.db, id).await?;
    tracing::info!(video_id = %id, user_id = %caller.id, "Video deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<Video> {
    db::videos::get_video(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Video {} not found", id)))
}

async fn ensure_card_exists(state: &AppState, card_id: Uuid) -> ApiResult<()> {
    if db::card_features::card_exists(&state.db, card_id).await? {
        Ok(())
    } else {
        Err(ApiError::field("card_feature_id", "card feature does not exist"))
    }
}

/// Build video routes
pub fn video_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/videos", get(list_videos).post(create_video))
        .route(
            "/api/videos/:id",
            get(get_video).put(update_video).delete(delete_video),
        )
        .route_layer(middleware::from_fn_with_state(state, optional_auth_middleware))
}
