//! # Conflict Retry
//!
//! Re-runs a whole unit of work when it failed transiently.
//!
//! ```text
//! attempt 1 ── Conflict ──► sleep 20ms ──► attempt 2 ── Conflict ──► sleep 40ms ─► ...
//!     │                                        │
//!     └── InsufficientStock: returned at once  └── Ok: returned
//! ```
//!
//! Each attempt opens its own write unit, so a failed attempt leaves nothing
//! behind (its transaction rolled back when dropped).

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::LedgerSettings;
use crate::error::LedgerResult;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&LedgerSettings::default())
    }
}

impl From<&LedgerSettings> for RetryPolicy {
    fn from(settings: &LedgerSettings) -> Self {
        RetryPolicy {
            max_retries: settings.max_conflict_retries,
            initial_backoff: Duration::from_millis(settings.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.retry_max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        // current_interval starts from the crate default otherwise
        backoff.reset();
        backoff
    }
}

/// Runs `unit` until it succeeds, fails permanently, or retries run out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut unit: F) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut backoff = policy.backoff();
    let mut attempt = 0u32;

    loop {
        match unit().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = backoff.next_backoff().unwrap_or(policy.max_backoff);
                warn!(operation, attempt, ?delay, error = %err, "Write conflict, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tally_core::CoreError;
    use tally_db::DbError;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&fast(3), "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::from(DbError::conflict("balance", "moved")))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: LedgerResult<()> = with_retry(&fast(2), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::conflict("sequence", "busy").into())
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_failures_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: LedgerResult<()> = with_retry(&fast(5), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::Unsupported("nope".into()).into())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_settings() {
        let policy = RetryPolicy::from(&LedgerSettings {
            max_conflict_retries: 4,
            retry_initial_backoff_ms: 10,
            retry_max_backoff_ms: 80,
        });
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.initial_backoff, Duration::from_millis(10));
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
