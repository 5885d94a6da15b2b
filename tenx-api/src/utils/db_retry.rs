//! Database retry logic
//!
//! The import task writes job progress while request handlers write to the
//! same SQLite file. A write that loses the race for the lock beyond the
//! connection busy timeout is retried here with exponential backoff.

use std::future::Future;
use std::time::{Duration, Instant};
use tenx_common::{Error, Result};

/// Default retry budget for background writes
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

/// Whether `err` is SQLite reporting a busy or locked database
pub fn is_lock_error(err: &Error) -> bool {
    match err {
        Error::Database(sqlx::Error::Database(db_err)) => {
            matches!(db_err.code().as_deref(), Some("5") | Some("6"))
                || db_err.message().contains("database is locked")
        }
        _ => false,
    }
}

/// Retry a database operation while it fails with a lock error
///
/// **Backoff:** starts at 10ms, doubles per attempt, capped at 1000ms.
/// Other errors are returned immediately. Once `max_wait_ms` has elapsed the
/// last failure is converted to `Error::Internal`.
pub async fn retry_on_lock<F, Fut, T>(operation_name: &str, max_wait_ms: u64, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_while(operation_name, max_wait_ms, is_lock_error, operation).await
}

async fn retry_while<F, Fut, T, P>(
    operation_name: &str,
    max_wait_ms: u64,
    should_retry: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !should_retry(&err) => return Err(err),
            Err(err) => {
                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(Error::Internal(format!(
                        "{}: database locked after {} attempts ({} ms): {}",
                        operation_name,
                        attempt,
                        elapsed.as_millis(),
                        err
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient(err: &Error) -> bool {
        matches!(err, Error::Internal(msg) if msg == "busy")
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let result = retry_on_lock("test_op", 1000, || async { Ok::<i32, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let mut attempts = 0;
        let result = retry_while("test_op", 5000, transient, || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(Error::Internal("busy".to_string()))
                } else {
                    Ok(current)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_wait() {
        let mut attempts = 0;
        let result = retry_while("test_op", 30, transient, || {
            attempts += 1;
            async { Err::<(), Error>(Error::Internal("busy".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(Error::Internal(msg)) if msg.contains("database locked")));
        assert!(attempts > 1);
    }

    #[tokio::test]
    async fn test_other_errors_fail_immediately() {
        let mut attempts = 0;
        let result = retry_on_lock("test_op", 5000, || {
            attempts += 1;
            async { Err::<(), Error>(Error::NotFound("job".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_non_database_errors_are_not_lock_errors() {
        assert!(!is_lock_error(&Error::Internal("database is locked".into())));
    }
}
