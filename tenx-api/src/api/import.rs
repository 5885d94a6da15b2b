//! GitHub import endpoints
//!
//! Starting an import inserts a pending job row, registers a cancellation
//! token and spawns the orchestrator. The token is dropped from the map when
//! the run ends, whatever the outcome.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tenx_common::events::{ImportJob, TenxEvent};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, ApiJson};
use crate::models::{AuthUser, StartImportRequest, StartImportResponse};
use crate::services::ImportOrchestrator;
use crate::AppState;

/// POST /api/card-features/import-github
pub async fn start_import(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<StartImportRequest>,
) -> ApiResult<(StatusCode, Json<StartImportResponse>)> {
    let repo = request.validate()?;

    if let Some(active) = db::import_jobs::find_active_for_user(&state.db, caller.id).await? {
        return Err(ApiError::Conflict(format!(
            "Import {} is still running; wait for it to finish or cancel it",
            active.id
        )));
    }

    let use_ai = request.use_ai.unwrap_or(false);
    if use_ai && state.llm.is_none() {
        tracing::info!(user_id = %caller.id, "AI import requested without a configured LLM; using heuristic text");
    }

    let job = ImportJob::new(caller.id, repo.html_url(), repo.branch.clone(), use_ai);
    db::import_jobs::insert_job(&state.db, &job).await?;
    state.event_bus.emit_lossy(TenxEvent::job_updated(&job));

    let job_id = job.id;
    let status = job.status;
    spawn_import(&state, job).await;

    tracing::info!(job_id = %job_id, user_id = %caller.id, repo = %repo.full_name(), "Import started");
    Ok((StatusCode::ACCEPTED, Json(StartImportResponse { job_id, status })))
}

async fn spawn_import(state: &AppState, job: ImportJob) {
    let job_id = job.id;
    let cancel_token = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(job_id, cancel_token.clone());

    let orchestrator = ImportOrchestrator::new(
        state.db.clone(),
        state.event_bus.clone(),
        state.github.clone(),
        state.llm.clone(),
        state.config.import.clone(),
    );
    let tokens = state.cancellation_tokens.clone();

    tokio::spawn(async move {
        let finished = orchestrator.run(job, cancel_token).await;
        tokens.write().await.remove(&job_id);
        tracing::debug!(job_id = %job_id, status = finished.status.as_str(), "Import task finished");
    });
}

/// GET /api/import-jobs
pub async fn list_jobs(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<Vec<ImportJob>>> {
    Ok(Json(db::import_jobs::list_for_user(&state.db, caller.id).await?))
}

/// GET /api/import-jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImportJob>> {
    Ok(Json(load_job(&state, id, &caller).await?))
}

/// POST /api/import-jobs/:id/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImportJob>> {
    let job = load_job(&state, id, &caller).await?;
    if job.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Import already finished with status {}",
            job.status.as_str()
        )));
    }

    if let Some(token) = state.cancellation_tokens.read().await.get(&id) {
        token.cancel();
    }

    // The row is written here so the cancellation is visible immediately,
    // even when the task is between steps
    let cancelled = db::import_jobs::cancel_job(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::Conflict("Import finished before it could be cancelled".to_string()))?;
    state.event_bus.emit_lossy(TenxEvent::job_updated(&cancelled));

    tracing::info!(job_id = %id, user_id = %caller.id, "Import cancelled by request");
    Ok(Json(cancelled))
}

/// Load a job the caller owns (or any job, for administrators)
///
/// Other users' jobs answer 404.
pub(crate) async fn load_job(state: &AppState, id: Uuid, caller: &AuthUser) -> ApiResult<ImportJob> {
    db::import_jobs::get_job(&state.db, id)
        .await?
        .filter(|job| caller.can_manage(job.created_by))
        .ok_or_else(|| ApiError::NotFound(format!("Import job {} not found", id)))
}

/// Build import routes
pub fn import_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/card-features/import-github", post(start_import))
        .route("/api/import-jobs", get(list_jobs))
        .route("/api/import-jobs/:id", get(get_job))
        .route("/api/import-jobs/:id/cancel", post(cancel_job))
        .route("/api/import-jobs/:id/events", get(super::sse::import_job_events))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
