//! Retry/backoff policy shared by every outbound [`crate::VectorGateway`]
//! call (§4.3, SPEC_FULL §C.3).

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff `min(2^(attempt-1) * base, max)`, `attempt` is
    /// 1-indexed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let scaled = self.base_delay.saturating_mul(factor);
        scaled.min(self.max_delay)
    }

    /// Run `op` up to `max_retries + 1` times, retrying only while `op`'s
    /// error is classified retryable and attempts remain.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(attempt, ?delay, "retrying after transient vector gateway error");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(10), Duration::from_secs(10));
    }

    #[derive(Debug)]
    struct AlwaysRetryable;
    impl Retryable for AlwaysRetryable {
        fn is_retryable(&self) -> bool {
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        };
        let mut calls = 0;
        let result: Result<(), AlwaysRetryable> = policy
            .run(|| {
                calls += 1;
                async { Err(AlwaysRetryable) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
