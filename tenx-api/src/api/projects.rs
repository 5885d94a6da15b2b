//! Project endpoints
//!
//! Projects are only visible to their members (and administrators); to
//! everyone else they answer 404. Owners manage the project and its
//! membership, any member manages its card list.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, ApiJson};
use crate::models::{
    AddMemberRequest, AddProjectCardRequest, AuthUser, CreateProjectRequest, Project, ProjectCard,
    ProjectDetail, ProjectMember, ProjectRole, UpdateProjectRequest,
};
use crate::validation::normalize_email;
use crate::AppState;

/// Response to adding a card
#[derive(Debug, Serialize)]
pub struct ProjectCardAdded {
    pub project_id: Uuid,
    pub card_feature_id: Uuid,
    pub position: i64,
}

/// Caller's standing in a project
struct Access {
    project: Project,
    role: Option<ProjectRole>,
    is_admin: bool,
}

impl Access {
    fn can_manage(&self) -> bool {
        self.is_admin || self.role == Some(ProjectRole::Owner)
    }

    fn require_owner(&self) -> ApiResult<()> {
        if self.can_manage() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Only project owners can do this".to_string()))
        }
    }
}

/// Load the project and the caller's role; non-members get 404
async fn access(state: &AppState, project_id: Uuid, caller: &AuthUser) -> ApiResult<Access> {
    let not_found = || ApiError::NotFound(format!("Project {} not found", project_id));

    let project = db::projects::get_project(&state.db, project_id)
        .await?
        .ok_or_else(not_found)?;
    let role = db::projects::member_role(&state.db, project_id, caller.id).await?;
    if role.is_none() && !caller.is_admin() {
        return Err(not_found());
    }

    Ok(Access {
        project,
        role,
        is_admin: caller.is_admin(),
    })
}

fn is_unique_violation(err: &tenx_common::Error) -> bool {
    matches!(err, tenx_common::Error::Database(sqlx::Error::Database(db)) if db.is_unique_violation())
}

// ========================================
// Projects
// ========================================

/// GET /api/projects
pub async fn list_projects(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<Vec<Project>>> {
    let projects = if caller.is_admin() {
        db::projects::list_all(&state.db).await?
    } else {
        db::projects::list_for_member(&state.db, caller.id).await?
    };
    Ok(Json(projects))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    request.validate()?;

    let project = request.into_project(caller.id);
    db::projects::insert_with_owner(&state.db, &project, caller.id).await?;

    tracing::info!(project_id = %project.id, user_id = %caller.id, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectDetail>> {
    let access = access(&state, id, &caller).await?;
    let members = db::projects::list_members(&state.db, id).await?;
    let card_count = db::projects::count_cards(&state.db, id).await?;

    Ok(Json(ProjectDetail {
        project: access.project,
        members,
        card_count,
    }))
}

/// PUT /api/projects/:id
pub async fn update_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    let access = access(&state, id, &caller).await?;
    access.require_owner()?;
    request.validate()?;

    let mut project = access.project;
    request.apply(&mut project);
    db::projects::update_project(&state.db, &project).await?;
    Ok(Json(project))
}

/// DELETE /api/projects/:id
pub async fn delete_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    access(&state, id, &caller).await?.require_owner()?;

    db::projects::delete_project(&state.db, id).await?;
    tracing::info!(project_id = %id, user_id = %caller.id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ========================================
// Members
// ========================================

/// POST /api/projects/:id/members
pub async fn add_member(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Vec<ProjectMember>>)> {
    access(&state, id, &caller).await?.require_owner()?;
    request.validate()?;

    let email = normalize_email(&request.email);
    let user = db::users::get_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No account with that email".to_string()))?;

    match db::projects::add_member(&state.db, id, user.id, ProjectRole::Member).await {
        Ok(()) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("User is already a member".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(project_id = %id, user_id = %user.id, "Project member added");
    let members = db::projects::list_members(&state.db, id).await?;
    Ok((StatusCode::CREATED, Json(members)))
}

/// DELETE /api/projects/:id/members/:user_id
///
/// Owners remove anyone; members may remove themselves.
pub async fn remove_member(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let access = access(&state, id, &caller).await?;
    if user_id != caller.id {
        access.require_owner()?;
    }

    let role = db::projects::member_role(&state.db, id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User is not a member of this project".to_string()))?;
    if role == ProjectRole::Owner && db::projects::count_owners(&state.db, id).await? <= 1 {
        return Err(ApiError::Conflict("Cannot remove the last project owner".to_string()));
    }

    db::projects::remove_member(&state.db, id, user_id).await?;
    tracing::info!(project_id = %id, user_id = %user_id, "Project member removed");
    Ok(StatusCode::NO_CONTENT)
}

// ========================================
// Cards
// ========================================

/// GET /api/projects/:id/cards
pub async fn list_project_cards(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ProjectCard>>> {
    access(&state, id, &caller).await?;
    Ok(Json(db::projects::list_cards(&state.db, id).await?))
}

/// POST /api/projects/:id/cards
pub async fn add_project_card(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<AddProjectCardRequest>,
) -> ApiResult<(StatusCode, Json<ProjectCardAdded>)> {
    access(&state, id, &caller).await?;

    let card_id = request.card_feature_id;
    let visible = db::card_features::get_card(&state.db, card_id)
        .await?
        .is_some_and(|card| card.is_visible_to(Some(&caller)));
    if !visible {
        return Err(ApiError::NotFound(format!("Card feature {} not found", card_id)));
    }

    let position = match db::projects::add_card(&state.db, id, card_id).await {
        Ok(position) => position,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Card is already in this project".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::CREATED,
        Json(ProjectCardAdded {
            project_id: id,
            card_feature_id: card_id,
            position,
        }),
    ))
}

/// DELETE /api/projects/:id/cards/:card_id
pub async fn remove_project_card(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, card_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    access(&state, id, &caller).await?;

    if !db::projects::remove_card(&state.db, id, card_id).await? {
        return Err(ApiError::NotFound("Card is not in this project".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Build project routes
pub fn project_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/projects/:id/members", post(add_member))
        .route("/api/projects/:id/members/:user_id", delete(remove_member))
        .route(
            "/api/projects/:id/cards",
            get(list_project_cards).post(add_project_card),
        )
        .route("/api/projects/:id/cards/:card_id", delete(remove_project_card))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
