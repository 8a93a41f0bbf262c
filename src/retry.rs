//! An explicit, reusable retry policy.
//!
//! Both the Postgres pool and the management-API client need "retry on
//! transient network failure, not on anything else" — rather than hiding a
//! decorator inside each call site, the policy is a value with a predicate
//! and a backoff schedule, applied by [`RetryPolicy::run`].

use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::jitter;
use tokio_retry::RetryIf;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Exponential backoff starting at 2s and capped at 10s, three attempts
    /// total — shared by pool creation, statement execution, and the HTTP
    /// client.
    pub const NETWORK: Self = Self {
        attempts: 3,
        min_backoff: Duration::from_secs(2),
        max_backoff: Duration::from_secs(10),
    };

    fn schedule(&self) -> Vec<Duration> {
        (0..self.attempts.saturating_sub(1))
            .map(|attempt| {
                let scaled = self.min_backoff.as_millis().saturating_mul(1u128 << attempt);
                Duration::from_millis(scaled.min(self.max_backoff.as_millis()) as u64)
            })
            .map(jitter)
            .collect()
    }

    /// Runs `action` until it succeeds, `should_retry` rejects the error, or
    /// the schedule is exhausted.
    pub async fn run<T, E, F, Fut>(&self, action: F, should_retry: impl FnMut(&E) -> bool) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        RetryIf::spawn(self.schedule().into_iter(), action, should_retry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, &'static str> = RetryPolicy::NETWORK
            .run(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("transient")
                        } else {
                            Ok(42)
                        }
                    }
                },
                |_: &&str| true,
            )
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_when_predicate_rejects() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, &'static str> = RetryPolicy::NETWORK
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move { Err("permission denied") }
                },
                |_: &&str| false,
            )
            .await;
        assert_eq!(result, Err("permission denied"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn schedule_has_one_fewer_step_than_attempts() {
        assert_eq!(RetryPolicy::NETWORK.schedule().len(), 2);
    }
}
