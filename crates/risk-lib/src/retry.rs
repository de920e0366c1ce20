//! Bounded retries for dataset and model-store I/O
//!
//! Every attempt runs under a timeout; failed attempts are retried after a
//! fixed delay until the retry budget is spent. Store and dataset errors that
//! another attempt cannot fix are returned at once.

use crate::error::{DataSourceError, StoreError};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-attempt timeout for I/O
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry and timeout policy for I/O around training and persistence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IoPolicy {
    /// Timeout for a single attempt
    pub timeout: Duration,
    /// Extra attempts after the first one fails
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for IoPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_IO_TIMEOUT,
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Whether `error` is worth another attempt
///
/// Timeouts and errors from outside this crate count as transient.
pub fn is_retryable(error: &anyhow::Error) -> bool {
    if let Some(e) = error.downcast_ref::<StoreError>() {
        return e.is_transient();
    }
    if let Some(e) = error.downcast_ref::<DataSourceError>() {
        return e.is_transient();
    }
    true
}

/// Run `op` under `policy`, returning the first successful result
pub async fn with_retry<T, F, Fut>(policy: &IoPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_retries + 1;
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Ok(Err(e)) => e,
            Err(_) => anyhow!("{} timed out after {:?}", operation, policy.timeout),
        };

        if !is_retryable(&error) {
            return Err(error.context(format!("{} failed", operation)));
        }
        if attempt >= attempts {
            return Err(error.context(format!("{} failed after {} attempts", operation, attempt)));
        }

        warn!(operation, attempt, error = %error, "Operation failed, retrying");
        tokio::time::sleep(policy.retry_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> IoPolicy {
        IoPolicy {
            timeout: Duration::from_millis(200),
            max_retries,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(&fast_policy(2), "flaky", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("transient");
            }
            Ok(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(&fast_policy(1), "broken", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("permanent")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let result: Result<()> = with_retry(&fast_policy(0), "slow", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("timed out"), "unexpected error: {}", message);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(&fast_policy(3), "read weights", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Corrupt {
                key: "risk-model/weights".to_string(),
                expected: "aa".to_string(),
                actual: "bb".to_string(),
            }
            .into())
        })
        .await;

        let error = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(error.downcast_ref::<StoreError>().is_some());
    }

    #[tokio::test]
    async fn test_transient_store_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(&fast_policy(2), "write weights", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Io {
                key: "risk-model/weights".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Interrupted, "interrupted"),
            }
            .into())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dataset_shape_errors_are_permanent() {
        assert!(!is_retryable(&DataSourceError::Empty.into()));
        assert!(!is_retryable(
            &DataSourceError::Insufficient {
                rows: 2,
                required: 10
            }
            .into()
        ));
        assert!(is_retryable(&anyhow!("connection reset")));
    }
}
