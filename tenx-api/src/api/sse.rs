//! Server-Sent Events for import job progress
//!
//! The stream opens with the job's current snapshot, then forwards every
//! event for that job until the job reaches a terminal status.

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use tenx_common::events::TenxEvent;
use tenx_common::sse::{json_event, with_heartbeat};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::import::load_job;
use crate::db;
use crate::error::ApiResult;
use crate::models::AuthUser;
use crate::AppState;

/// GET /api/import-jobs/:id/events
pub async fn import_job_events(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Subscribe before reading the snapshot so no update falls in between
    let mut rx = state.event_bus.subscribe();
    let snapshot = load_job(&state, id, &caller).await?;
    let pool = state.db.clone();

    info!(job_id = %id, user_id = %caller.id, "SSE client connected to import job");

    let stream = async_stream::stream! {
        let snapshot_event = TenxEvent::job_updated(&snapshot);
        yield Ok(json_event(snapshot_event.event_type(), &snapshot_event));
        if snapshot.status.is_terminal() {
            debug!(job_id = %id, "SSE: job already finished, closing");
            return;
        }

        loop {
            match rx.recv().await {
                Ok(event) if event.job_id() == id => {
                    let finished = matches!(
                        &event,
                        TenxEvent::ImportJobUpdated { job, .. } if job.status.is_terminal()
                    );
                    yield Ok(json_event(event.event_type(), &event));
                    if finished {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    // Missed updates are replaced by a fresh snapshot
                    warn!(job_id = %id, skipped, "SSE: subscriber lagged, resending snapshot");
                    match db::import_jobs::get_job(&pool, id).await {
                        Ok(Some(job)) => {
                            let event = TenxEvent::job_updated(&job);
                            yield Ok(json_event(event.event_type(), &event));
                            if job.status.is_terminal() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(job_id = %id, error = %e, "SSE: failed to reload job");
                            break;
                        }
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }

        debug!(job_id = %id, "SSE: import event stream closed");
    };

    Ok(with_heartbeat(stream))
}
