//! Import job queries
//!
//! Progress writes are guarded on the row still being non-terminal: once a
//! job is cancelled (or marked interrupted) no later write from the
//! background task can resurrect it.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tenx_common::db::{format_timestamp, now_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use tenx_common::events::{ImportJob, ImportStatus, ImportStep};
use tenx_common::{Error, Result};
use uuid::Uuid;

/// Error recorded on jobs a previous process left unfinished
pub const INTERRUPTED_MESSAGE: &str = "interrupted by server restart";

const JOB_COLUMNS: &str = "id, created_by, repo_url, branch, use_ai, status, step, progress, \
     message, cards_created, error, created_at, updated_at";

const ACTIVE: &str = "status IN ('pending', 'running')";

fn job_from_row(row: &SqliteRow) -> Result<ImportJob> {
    let status: String = row.get("status");
    let step: String = row.get("step");

    Ok(ImportJob {
        id: parse_uuid(row.get("id"))?,
        created_by: parse_optional_uuid(row.get("created_by"))?,
        repo_url: row.get("repo_url"),
        branch: row.get("branch"),
        use_ai: row.get("use_ai"),
        status: ImportStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Invalid stored import status '{}'", status)))?,
        step: ImportStep::parse(&step)
            .ok_or_else(|| Error::Internal(format!("Invalid stored import step '{}'", step)))?,
        progress: row.get("progress"),
        message: row.get("message"),
        cards_created: row.get("cards_created"),
        error: row.get("error"),
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

pub async fn insert_job(pool: &SqlitePool, job: &ImportJob) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO import_jobs (
            id, created_by, repo_url, branch, use_ai, status, step, progress,
            message, cards_created, error, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.created_by.map(|id| id.to_string()))
    .bind(&job.repo_url)
    .bind(&job.branch)
    .bind(job.use_ai)
    .bind(job.status.as_str())
    .bind(job.step.as_str())
    .bind(job.progress)
    .bind(&job.message)
    .bind(job.cards_created)
    .bind(&job.error)
    .bind(format_timestamp(job.created_at))
    .bind(format_timestamp(job.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_job(pool: &SqlitePool, id: Uuid) -> Result<Option<ImportJob>> {
    let row = sqlx::query(&format!("SELECT {} FROM import_jobs WHERE id = ?", JOB_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Jobs started by `user_id`, newest first
pub async fn list_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<ImportJob>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM import_jobs WHERE created_by = ? ORDER BY created_at DESC, id",
        JOB_COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// The caller's pending or running job, if any
pub async fn find_active_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Option<ImportJob>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM import_jobs WHERE created_by = ? AND {} ORDER BY created_at DESC LIMIT 1",
        JOB_COLUMNS, ACTIVE
    ))
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Persist progress fields of `job`
///
/// Returns `false` without writing when the stored row is already terminal.
pub async fn update_job(pool: &SqlitePool, job: &ImportJob) -> Result<bool> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE import_jobs
        SET status = ?, step = ?, progress = ?, message = ?, cards_created = ?,
            error = ?, updated_at = ?
        WHERE id = ? AND {}
        "#,
        ACTIVE
    ))
    .bind(job.status.as_str())
    .bind(job.step.as_str())
    .bind(job.progress)
    .bind(&job.message)
    .bind(job.cards_created)
    .bind(&job.error)
    .bind(format_timestamp(job.updated_at))
    .bind(job.id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Cancel a non-terminal job; returns the updated row, `None` if it was
/// missing or already terminal
///
/// Only status columns are written, so `cards_created` from a concurrent
/// progress write survives.
pub async fn cancel_job(pool: &SqlitePool, id: Uuid) -> Result<Option<ImportJob>> {
    let result = sqlx::query(&format!(
        "UPDATE import_jobs SET status = 'cancelled', message = 'Import cancelled', updated_at = ? \
         WHERE id = ? AND {}",
        ACTIVE
    ))
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_job(pool, id).await
}

/// Record the card count of a job that was cancelled while cards were being saved
///
/// Returns `false` unless the row is cancelled.
pub async fn record_cancelled_cards(pool: &SqlitePool, id: Uuid, cards_created: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE import_jobs SET cards_created = ? WHERE id = ? AND status = 'cancelled'")
        .bind(cards_created)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Fail every job left pending or running; returns how many were changed
pub async fn mark_interrupted(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(&format!(
        "UPDATE import_jobs SET status = 'error', error = ?, message = ?, updated_at = ? WHERE {}",
        ACTIVE
    ))
    .bind(INTERRUPTED_MESSAGE)
    .bind(format!("Import failed: {}", INTERRUPTED_MESSAGE))
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Job counts keyed by status
pub async fn count_by_status(pool: &SqlitePool) -> Result<BTreeMap<String, i64>> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM import_jobs GROUP BY status")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get::<String, _>("status"), row.get::<i64, _>("count")))
        .collect())
}
