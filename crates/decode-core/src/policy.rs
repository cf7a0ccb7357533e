//! Timeout and retry policy for calls to external services.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ServiceError;

const MAX_BACKOFF_SHIFT: u32 = 6;

/// How one external service call is bounded and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Upper bound on a single attempt.
    pub timeout: Duration,
    /// Additional attempts after the first on transient failures.
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt.
    pub retry_base: Duration,
}

impl CallPolicy {
    /// A policy with a timeout and no retries.
    pub fn once(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            retry_base: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt + 1`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(MAX_BACKOFF_SHIFT);
        self.retry_base.saturating_mul(1u32 << shift)
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_base: Duration::from_millis(200),
        }
    }
}

/// Run `op` under `policy`: each attempt is bounded by the timeout, transient
/// failures are retried with exponential backoff, anything else returns at once.
pub async fn call_with_retry<T, F, Fut>(
    policy: &CallPolicy,
    service: &str,
    mut op: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(policy.timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.retry_delay(attempt);
                warn!(
                    service,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient service failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(200),
            max_retries,
            retry_base: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = CallPolicy {
            timeout: Duration::from_secs(1),
            max_retries: 10,
            retry_base: Duration::from_millis(200),
        };
        assert_eq!(policy.retry_delay(0), Duration::from_millis(200));
        assert_eq!(policy.retry_delay(1), Duration::from_millis(400));
        assert_eq!(policy.retry_delay(2), Duration::from_millis(800));
        assert_eq!(policy.retry_delay(6), policy.retry_delay(20));
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = AtomicU32::new(0);
        let result = call_with_retry(&fast_policy(2), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ServiceError>(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let calls = AtomicU32::new(0);
        let result = call_with_retry(&fast_policy(2), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ServiceError::Status {
                        status: 503,
                        body: "busy".into(),
                    })
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = call_with_retry(&fast_policy(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ServiceError::InvalidResponse("garbage".into())) }
        })
        .await;
        assert!(matches!(result, Err(ServiceError::InvalidResponse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = call_with_retry(&fast_policy(2), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ServiceError::Network("refused".into())) }
        })
        .await;
        assert!(matches!(result, Err(ServiceError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let policy = CallPolicy::once(Duration::from_millis(10));
        let result: Result<(), _> = call_with_retry(&policy, "test", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ServiceError::Timeout(_))));
    }
}
