//! Server-Sent Events (SSE) utilities

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::warn;

/// Interval between keep-alive comments on idle streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Wrap an event stream with the standard heartbeat
pub fn with_heartbeat<S>(stream: S) -> Sse<S>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

/// Named SSE event with a JSON payload
///
/// Serialization failures produce an `error` event instead of dropping the
/// connection.
pub fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(data) => Event::default().event(name).data(data),
        Err(e) => {
            warn!("Failed to serialize SSE payload for {}: {}", name, e);
            Event::default().event("error").data(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_event_accepts_serializable_payload() {
        // Event has no public accessors; building it must not panic
        let _ = json_event("ImportJobUpdated", &serde_json::json!({"progress": 10}));
    }
}
