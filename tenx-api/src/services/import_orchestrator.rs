//! Import job orchestrator
//!
//! # Step progression
//! starting → downloading_zip → extracting_files → analyzing_repo →
//! generating_cards → creating_cards → done
//!
//! Every step is persisted before its event is emitted. Row writes are
//! guarded on the job still being active; a write that finds the row
//! terminal means the job was cancelled (or its owner deleted) and the run
//! stops without touching the row again. Cards saved before a cancellation
//! are kept.

use sqlx::SqlitePool;
use std::future::Future;
use std::time::Instant;
use tenx_common::config::ImportConfig;
use tenx_common::events::{EventBus, ImportJob, ImportStep, TenxEvent};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::archive::{extract_source_files, ArchiveError, ExtractLimits};
use super::card_generator::{generate_cards, CardDraft, GenerateLimits};
use super::github_client::{GithubClient, GithubError, GithubRepo};
use super::llm_client::LlmClient;
use super::repo_analyzer::analyze;
use crate::db;
use crate::models::ApprovalStatus;
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Reasons an import run ends early
#[derive(Debug, Error)]
pub enum ImportError {
    /// Cancelled through the token, or the row became terminal underneath us
    #[error("Import cancelled")]
    Cancelled,

    #[error(transparent)]
    Github(#[from] GithubError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Database error: {0}")]
    Database(#[from] tenx_common::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Runs one import job to completion
#[derive(Clone)]
pub struct ImportOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    github: GithubClient,
    llm: Option<LlmClient>,
    limits: ImportConfig,
}

impl ImportOrchestrator {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        github: GithubClient,
        llm: Option<LlmClient>,
        limits: ImportConfig,
    ) -> Self {
        Self {
            db,
            event_bus,
            github,
            llm,
            limits,
        }
    }

    /// Execute the job and record its final state
    ///
    /// Never returns an error: failures are written to the job row.
    pub async fn run(&self, mut job: ImportJob, cancel_token: CancellationToken) -> ImportJob {
        let start_time = Instant::now();
        tracing::info!(job_id = %job.id, repo = %job.repo_url, use_ai = job.use_ai, "Starting import");

        match self.execute(&mut job, &cancel_token).await {
            Ok(card_ids) => {
                tracing::info!(
                    job_id = %job.id,
                    cards = card_ids.len(),
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "Import completed"
                );
            }
            Err(ImportError::Cancelled) => {
                job.cancel();
                match self.persist(&job).await {
                    Ok(true) => self.event_bus.emit_lossy(TenxEvent::job_updated(&job)),
                    Ok(false) => {}
                    Err(e) => tracing::error!(job_id = %job.id, error = %e, "Failed to record cancellation"),
                }
                tracing::info!(job_id = %job.id, cards = job.cards_created, "Import cancelled");
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, step = job.step.as_str(), error = %e, "Import failed");
                job.fail(e.to_string());
                match self.persist(&job).await {
                    Ok(true) => self.event_bus.emit_lossy(TenxEvent::job_updated(&job)),
                    Ok(false) => {}
                    Err(e) => tracing::error!(job_id = %job.id, error = %e, "Failed to record import failure"),
                }
            }
        }

        job
    }

    async fn execute(&self, job: &mut ImportJob, cancel_token: &CancellationToken) -> Result<Vec<Uuid>, ImportError> {
        let mut repo = GithubRepo::parse(&job.repo_url)?;
        repo.branch = job.branch.clone();

        // Download
        self.advance(job, ImportStep::DownloadingZip).await?;
        let bytes = cancellable(
            cancel_token,
            self.github.download_zipball(&repo, self.limits.max_archive_bytes),
        )
        .await??;
        tracing::debug!(job_id = %job.id, bytes = bytes.len(), "Archive downloaded");

        // Extract
        self.advance(job, ImportStep::ExtractingFiles).await?;
        let extract_limits = ExtractLimits {
            max_file_bytes: self.limits.max_file_bytes,
            max_files: self.limits.max_files,
        };
        let extracted = cancellable(
            cancel_token,
            tokio::task::spawn_blocking(move || extract_source_files(&bytes, extract_limits)),
        )
        .await?
        .map_err(|e| ImportError::Task(e.to_string()))??;
        tracing::debug!(
            job_id = %job.id,
            files = extracted.files.len(),
            skipped = extracted.skipped,
            truncated = extracted.truncated,
            "Archive extracted"
        );

        // Analyze
        self.advance(job, ImportStep::AnalyzingRepo).await?;
        let analysis = analyze(&extracted.files);
        tracing::debug!(job_id = %job.id, tech = %analysis.tech, language = %analysis.language, "Repository analyzed");

        // Generate
        self.advance(job, ImportStep::GeneratingCards).await?;
        let generate_limits = GenerateLimits {
            max_cards: self.limits.max_cards,
            max_screens_per_card: self.limits.max_screens_per_card,
        };
        let mut drafts = generate_cards(&repo, &analysis, &extracted.files, generate_limits);
        if job.use_ai {
            self.reword(job.id, &repo, &mut drafts, cancel_token).await?;
        }

        // Create
        self.advance(job, ImportStep::CreatingCards).await?;
        let card_ids = self.create_cards(job, drafts, cancel_token).await?;

        self.event_bus.emit_lossy(TenxEvent::ImportCardsCreated {
            job_id: job.id,
            card_ids: card_ids.clone(),
            timestamp: chrono::Utc::now(),
        });

        job.complete(card_ids.len() as i64);
        self.save(job).await?;
        Ok(card_ids)
    }

    /// Replace heuristic titles and descriptions with LLM suggestions
    ///
    /// Any LLM failure keeps the heuristic text for that card.
    async fn reword(
        &self,
        job_id: Uuid,
        repo: &GithubRepo,
        drafts: &mut [CardDraft],
        cancel_token: &CancellationToken,
    ) -> Result<(), ImportError> {
        let Some(llm) = &self.llm else {
            tracing::info!(job_id = %job_id, "AI requested but no LLM configured; using generated text");
            return Ok(());
        };

        let repo_name = repo.full_name();
        for draft in drafts.iter_mut() {
            match cancellable(cancel_token, llm.describe_card(&repo_name, draft)).await? {
                Ok(text) => {
                    draft.title = text.title;
                    if !text.description.trim().is_empty() {
                        draft.description = text.description;
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id = %job_id, card = %draft.title, error = %e, "LLM rewording failed, keeping generated text");
                }
            }
        }
        Ok(())
    }

    async fn create_cards(
        &self,
        job: &mut ImportJob,
        drafts: Vec<CardDraft>,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<Uuid>, ImportError> {
        let mut card_ids = Vec::with_capacity(drafts.len());

        for draft in drafts {
            if cancel_token.is_cancelled() {
                return Err(ImportError::Cancelled);
            }

            let request = draft.into_request();
            if let Err(e) = request.validate() {
                tracing::warn!(job_id = %job.id, title = %request.title, error = %e, "Skipping generated card that fails validation");
                continue;
            }

            let card = request.into_card(job.created_by, ApprovalStatus::Approved);
            let db_pool = &self.db;
            let card_ref = &card;
            retry_on_lock("insert imported card", DEFAULT_MAX_LOCK_WAIT_MS, move || {
                db::card_features::insert_card(db_pool, card_ref)
            })
            .await?;

            card_ids.push(card.id);
            job.cards_created = card_ids.len() as i64;
            job.message = format!("Saved {} cards", card_ids.len());
            job.updated_at = chrono::Utc::now();
            if !self.persist(job).await? {
                // Cancelled while this card was being inserted
                db::import_jobs::record_cancelled_cards(&self.db, job.id, job.cards_created).await?;
                return Err(ImportError::Cancelled);
            }
            self.event_bus.emit_lossy(TenxEvent::job_updated(job));
        }

        Ok(card_ids)
    }

    /// Enter `step`, persist and announce it
    async fn advance(&self, job: &mut ImportJob, step: ImportStep) -> Result<(), ImportError> {
        job.advance(step);
        tracing::debug!(job_id = %job.id, step = step.as_str(), progress = job.progress, "Import step");
        self.save(job).await
    }

    /// Persist and emit; a terminal row stops the run
    async fn save(&self, job: &ImportJob) -> Result<(), ImportError> {
        if !self.persist(job).await? {
            return Err(ImportError::Cancelled);
        }
        self.event_bus.emit_lossy(TenxEvent::job_updated(job));
        Ok(())
    }

    async fn persist(&self, job: &ImportJob) -> tenx_common::Result<bool> {
        let db_pool = &self.db;
        retry_on_lock("update import job", DEFAULT_MAX_LOCK_WAIT_MS, move || {
            db::import_jobs::update_job(db_pool, job)
        })
        .await
    }
}

/// Race `fut` against the cancellation token
async fn cancellable<F, T>(cancel_token: &CancellationToken, fut: F) -> Result<T, ImportError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => Err(ImportError::Cancelled),
        out = fut => Ok(out),
    }
}
