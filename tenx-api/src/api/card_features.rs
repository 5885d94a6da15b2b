//! Card feature endpoints
//!
//! Listing and reading are open to anonymous callers; what they see depends
//! on who is asking:
//!
//! | Caller         | Listing                                   |
//! |----------------|-------------------------------------------|
//! | anonymous      | public + approved                         |
//! | user           | public + approved, plus own cards         |
//! | user, `mine`   | own cards only                            |
//! | admin          | everything                                |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::db::card_features::{self as cards, CardFilter, ListScope};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, optional_auth_middleware, ApiJson};
use crate::models::{
    non_blank, ApprovalStatus, AuthUser, BulkCreateRequest, BulkCreateResponse, CardFeature, CardFeatureQuery,
    CardFeatureStats, CreateCardFeatureRequest, UpdateCardFeatureRequest,
};
use crate::pagination::{Page, PageParams};
use crate::AppState;

fn list_scope(caller: Option<&AuthUser>, mine: bool) -> ListScope {
    match caller {
        Some(user) if mine => ListScope::OwnedBy(user.id),
        Some(user) if user.is_admin() => ListScope::All,
        Some(user) => ListScope::PublicOrOwnedBy(user.id),
        None => ListScope::Public,
    }
}

/// GET /api/card-features
pub async fn list_card_features(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    Query(query): Query<CardFeatureQuery>,
) -> ApiResult<Json<Page<CardFeature>>> {
    if query.mine && caller.is_none() {
        return Err(ApiError::Unauthorized("Sign in to list your own cards".to_string()));
    }

    let filter = CardFilter {
        scope: list_scope(caller.as_ref(), query.mine),
        search: non_blank(query.search.as_deref()),
        tech: non_blank(query.tech.as_deref()),
        language: non_blank(query.language.as_deref()),
        card_type: query.card_type,
    };

    let total = cards::count_cards(&state.db, &filter).await?;
    let pagination = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(total);
    let data = cards::list_cards(&state.db, &filter, pagination.limit, pagination.offset).await?;

    Ok(Json(Page::new(data, pagination, total)))
}

/// GET /api/card-features/stats
pub async fn card_feature_stats(State(state): State<AppState>) -> ApiResult<Json<CardFeatureStats>> {
    Ok(Json(cards::stats(&state.db).await?))
}

/// GET /api/card-features/:id
pub async fn get_card_feature(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CardFeature>> {
    let card = load_visible(&state, id, caller.as_ref()).await?;
    Ok(Json(card))
}

/// POST /api/card-features
pub async fn create_card_feature(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<CreateCardFeatureRequest>,
) -> ApiResult<(StatusCode, Json<CardFeature>)> {
    request.validate()?;

    let approval = ApprovalStatus::initial(request.visibility.unwrap_or_default(), caller.is_admin());
    let card = request.into_card(Some(caller.id), approval);
    cards::insert_card(&state.db, &card).await?;

    tracing::info!(card_id = %card.id, user_id = %caller.id, approval = approval.as_str(), "Card created");
    Ok((StatusCode::CREATED, Json(card)))
}

/// POST /api/card-features/bulk
///
/// Either every card is stored or none is.
pub async fn bulk_create_card_features(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<BulkCreateRequest>,
) -> ApiResult<(StatusCode, Json<BulkCreateResponse>)> {
    request.validate()?;

    let is_admin = caller.is_admin();
    let new_cards: Vec<CardFeature> = request
        .cards
        .into_iter()
        .map(|req| {
            let approval = ApprovalStatus::initial(req.visibility.unwrap_or_default(), is_admin);
            req.into_card(Some(caller.id), approval)
        })
        .collect();

    cards::insert_cards(&state.db, &new_cards).await?;

    let ids: Vec<Uuid> = new_cards.iter().map(|c| c.id).collect();
    tracing::info!(user_id = %caller.id, count = ids.len(), "Bulk card creation");
    Ok((
        StatusCode::CREATED,
        Json(BulkCreateResponse {
            created: ids.len(),
            ids,
        }),
    ))
}

/// PUT /api/card-features/:id
pub async fn update_card_feature(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateCardFeatureRequest>,
) -> ApiResult<Json<CardFeature>> {
    let mut card = load_visible(&state, id, Some(&caller)).await?;
    if !caller.can_manage(card.created_by) {
        return Err(ApiError::Forbidden("Only the owner can edit this card".to_string()));
    }
    request.validate()?;

    let previous = card.approval_status;
    request.apply(&mut card, caller.is_admin());
    cards::update_card(&state.db, &card).await?;

    if previous != card.approval_status {
        tracing::info!(card_id = %id, "Card returned to moderation after edit");
    }
    Ok(Json(card))
}

/// DELETE /api/card-features/:id
pub async fn delete_card_feature(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let card = load_visible(&state, id, Some(&caller)).await?;
    if !caller.can_manage(card.created_by) {
        return Err(ApiError::Forbidden("Only the owner can delete this card".to_string()));
    }

    cards::delete_card(&state.db, id).await?;
    tracing::info!(card_id = %id, user_id = %caller.id, "Card deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a card, answering 404 both when it is missing and when the caller
/// may not see it
async fn load_visible(state: &AppState, id: Uuid, caller: Option<&AuthUser>) -> ApiResult<CardFeature> {
    cards::get_card(&state.db, id)
        .await?
        .filter(|card| card.is_visible_to(caller))
        .ok_or_else(|| ApiError::NotFound(format!("Card feature {} not found", id)))
}

/// Build card feature routes
pub fn card_feature_routes(state: AppState) -> Router<AppState> {
    let open = Router::new()
        .route("/api/card-features", get(list_card_features).post(create_card_feature))
        .route("/api/card-features/stats", get(card_feature_stats))
        .route(
            "/api/card-features/:id",
            get(get_card_feature)
                .put(update_card_feature)
                .delete(delete_card_feature),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), optional_auth_middleware));

    let authenticated = Router::new()
        .route("/api/card-features/bulk", post(bulk_create_card_features))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    open.merge(authenticated)
}
