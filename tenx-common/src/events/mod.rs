//! Event types for the in-process event system
//!
//! Provides the shared event definitions and the broadcast EventBus used to
//! push import progress to SSE subscribers.

mod import_types;

pub use import_types::{ImportJob, ImportStatus, ImportStep};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events broadcast on the [`EventBus`]
///
/// Serialized with a `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TenxEvent {
    /// Import job row changed (step, progress, status)
    ///
    /// Emitted after the row has been persisted, so a subscriber that reads
    /// the row afterwards never sees an older state.
    ImportJobUpdated {
        /// Full job snapshot after the change
        job: ImportJob,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Cards produced by an import were saved
    ImportCardsCreated {
        job_id: Uuid,
        /// Ids in creation order
        card_ids: Vec<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TenxEvent {
    /// Event type string, used as the SSE `event:` name
    pub fn event_type(&self) -> &str {
        match self {
            TenxEvent::ImportJobUpdated { .. } => "ImportJobUpdated",
            TenxEvent::ImportCardsCreated { .. } => "ImportCardsCreated",
        }
    }

    /// Import job this event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            TenxEvent::ImportJobUpdated { job, .. } => job.id,
            TenxEvent::ImportCardsCreated { job_id, .. } => *job_id,
        }
    }

    /// Snapshot event for a job
    pub fn job_updated(job: &ImportJob) -> Self {
        TenxEvent::ImportJobUpdated {
            job: job.clone(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Central event distribution bus
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TenxEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenx_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TenxEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TenxEvent,
    ) -> Result<usize, broadcast::error::SendError<TenxEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TenxEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
