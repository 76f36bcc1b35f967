use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Errors that can tell a quota rejection apart from every other failure.
pub trait RateLimitSignal {
    fn is_rate_limited(&self) -> bool;
}

/// Constant-delay retry for rate-limited calls. There is no attempt limit;
/// wrap the call in `tokio::time::timeout` when waiting must be bounded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }
}

/// Runs `operation` until it succeeds or fails with something other than a rate limit.
pub async fn call_with_retry<T, E, Op, Fut>(policy: &RetryPolicy, mut operation: Op) -> Result<T, E>
where
    E: RateLimitSignal + std::fmt::Display,
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retries: u64 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_rate_limited() => {
                retries += 1;
                warn!(
                    retries,
                    delay_secs = policy.delay.as_secs_f64(),
                    error = %error,
                    "Service is busy. Retrying in {} seconds...",
                    policy.delay.as_secs_f64()
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}
