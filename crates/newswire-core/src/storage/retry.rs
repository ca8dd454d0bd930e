//! Retry for SQLite operations that hit lock contention or transient I/O errors,
//! e.g. when the scheduler and a manual `run` write the same database file.

use std::future::Future;
use std::time::Duration;

use crate::fetch::RetryPolicy;

/// Total attempts for a database operation
pub const MAX_ATTEMPTS: u32 = 6;

/// SQLite result codes worth retrying
///
/// - SQLITE_BUSY (5) / SQLITE_BUSY_SNAPSHOT (1032)
/// - SQLITE_LOCKED (6)
/// - SQLITE_IOERR (10) and its read/short-read/write/fsync/lock variants
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            matches!(
                code.as_deref(),
                Some("5" | "6" | "10" | "266" | "522" | "1032" | "2314" | "3338" | "5386")
            )
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// 200ms, 400ms, 800ms, 1600ms, 3200ms
fn policy() -> RetryPolicy {
    RetryPolicy::new(MAX_ATTEMPTS, Duration::from_millis(200), Duration::from_millis(3200))
}

/// Run a query, retrying transient SQLite errors with exponential backoff
pub async fn with_retry<F, Fut, T>(operation: F) -> std::result::Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let attempted = policy().run(|_| operation(), is_transient_error).await;
    if attempted.attempts > 1 {
        tracing::debug!(
            attempts = attempted.attempts,
            ok = attempted.result.is_ok(),
            "Database operation needed retries"
        );
    }
    attempted.result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_schedule() {
        let policy = policy();
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(800));
        assert_eq!(policy.backoff_delay(5), Duration::from_millis(3200));
        assert_eq!(policy.backoff_delay(9), Duration::from_millis(3200));
    }

    #[test]
    fn test_non_database_errors_are_not_transient() {
        assert!(!is_transient_error(&sqlx::Error::RowNotFound));
        assert!(is_transient_error(&sqlx::Error::PoolTimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_returned_after_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_is_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }
}
