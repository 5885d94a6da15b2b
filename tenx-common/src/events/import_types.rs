//! Import job type definitions
//!
//! Shared by the import pipeline, its persistence layer and the SSE stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Import job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Pending,
    Running,
    Done,
    Error,
    Cancelled,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Running => "running",
            ImportStatus::Done => "done",
            ImportStatus::Error => "error",
            ImportStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ImportStatus::Pending),
            "running" => Some(ImportStatus::Running),
            "done" => Some(ImportStatus::Done),
            "error" => Some(ImportStatus::Error),
            "cancelled" => Some(ImportStatus::Cancelled),
            _ => None,
        }
    }

    /// Finished (successfully or not); no further updates follow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportStatus::Done | ImportStatus::Error | ImportStatus::Cancelled
        )
    }
}

/// Pipeline step, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStep {
    Starting,
    DownloadingZip,
    ExtractingFiles,
    AnalyzingRepo,
    GeneratingCards,
    CreatingCards,
    Done,
}

impl ImportStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStep::Starting => "starting",
            ImportStep::DownloadingZip => "downloading_zip",
            ImportStep::ExtractingFiles => "extracting_files",
            ImportStep::AnalyzingRepo => "analyzing_repo",
            ImportStep::GeneratingCards => "generating_cards",
            ImportStep::CreatingCards => "creating_cards",
            ImportStep::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "starting" => Some(ImportStep::Starting),
            "downloading_zip" => Some(ImportStep::DownloadingZip),
            "extracting_files" => Some(ImportStep::ExtractingFiles),
            "analyzing_repo" => Some(ImportStep::AnalyzingRepo),
            "generating_cards" => Some(ImportStep::GeneratingCards),
            "creating_cards" => Some(ImportStep::CreatingCards),
            "done" => Some(ImportStep::Done),
            _ => None,
        }
    }

    /// Progress percentage reported when the step begins
    pub fn progress(&self) -> i64 {
        match self {
            ImportStep::Starting => 0,
            ImportStep::DownloadingZip => 10,
            ImportStep::ExtractingFiles => 30,
            ImportStep::AnalyzingRepo => 50,
            ImportStep::GeneratingCards => 70,
            ImportStep::CreatingCards => 90,
            ImportStep::Done => 100,
        }
    }

    /// Human-readable description shown while the step runs
    pub fn message(&self) -> &'static str {
        match self {
            ImportStep::Starting => "Queued",
            ImportStep::DownloadingZip => "Downloading repository archive",
            ImportStep::ExtractingFiles => "Extracting source files",
            ImportStep::AnalyzingRepo => "Analyzing repository",
            ImportStep::GeneratingCards => "Generating cards",
            ImportStep::CreatingCards => "Saving cards",
            ImportStep::Done => "Import finished",
        }
    }
}

/// Import job row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub created_by: Option<Uuid>,
    pub repo_url: String,
    pub branch: Option<String>,
    pub use_ai: bool,
    pub status: ImportStatus,
    pub step: ImportStep,
    /// 0 - 100
    pub progress: i64,
    pub message: String,
    pub cards_created: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// New pending job
    pub fn new(created_by: Uuid, repo_url: String, branch: Option<String>, use_ai: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_by: Some(created_by),
            repo_url,
            branch,
            use_ai,
            status: ImportStatus::Pending,
            step: ImportStep::Starting,
            progress: 0,
            message: ImportStep::Starting.message().to_string(),
            cards_created: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Enter a running step
    pub fn advance(&mut self, step: ImportStep) {
        self.status = ImportStatus::Running;
        self.step = step;
        self.progress = step.progress();
        self.message = step.message().to_string();
        self.updated_at = Utc::now();
    }

    /// Mark finished successfully
    pub fn complete(&mut self, cards_created: i64) {
        self.status = ImportStatus::Done;
        self.step = ImportStep::Done;
        self.progress = 100;
        self.cards_created = cards_created;
        self.message = format!("Import finished: {} cards created", cards_created);
        self.updated_at = Utc::now();
    }

    /// Mark failed; step and progress stay where the failure happened
    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.status = ImportStatus::Error;
        self.message = format!("Import failed: {}", error);
        self.error = Some(error);
        self.updated_at = Utc::now();
    }

    /// Mark cancelled
    pub fn cancel(&mut self) {
        self.status = ImportStatus::Cancelled;
        self.message = "Import cancelled".to_string();
        self.updated_at = Utc::now();
    }
}
