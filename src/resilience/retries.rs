//! Retry logic.
//!
//! # Responsibilities
//! - Classify failures as transient or permanent
//! - Execute retries with a linearly increasing delay
//! - Run a hook (endpoint rotation) before each retry
//!
//! # Design Decisions
//! - Permanent failures (execution reverts, bad input) are never retried
//! - Every attempt is raced against the per-attempt timeout
//! - No jitter: the delay for attempt `n` is `base + step * n`

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::RpcConfig;
use crate::resilience::timeouts::with_timeout;

/// Substrings that mark an RPC error payload as transient.
pub const TRANSIENT_MARKERS: [&str; 5] = [
    "server response",
    "network error",
    "timeout",
    "quota",
    "rate limit",
];

/// Errors that know whether retrying may help.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Whether an error message carries one of the transient markers.
pub fn message_is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// The attempt did not finish within the attempt timeout.
    TimedOut(Duration),
    /// The attempt finished with an error.
    Failed(E),
}

impl<E: Retryable> AttemptError<E> {
    pub fn is_transient(&self) -> bool {
        match self {
            AttemptError::TimedOut(_) => true,
            AttemptError::Failed(e) => e.is_transient(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::TimedOut(d) => write!(f, "timed out after {} ms", d.as_millis()),
            AttemptError::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Retry schedule for a fallible async operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Deadline for each attempt.
    pub attempt_timeout: Duration,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Extra delay added per attempt.
    pub delay_step: Duration,
}

impl RetryPolicy {
    /// Total number of attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay to wait after failed attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay + self.delay_step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RpcConfig::default())
    }
}

impl From<&RpcConfig> for RetryPolicy {
    fn from(config: &RpcConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            attempt_timeout: Duration::from_millis(config.timeout_ms),
            base_delay: Duration::from_millis(config.base_delay_ms),
            delay_step: Duration::from_millis(config.delay_step_ms),
        }
    }
}

/// Run `op` under `policy`.
///
/// `op` receives the 0-based attempt number. `on_retry` runs after a
/// transient failure and before the delay; it receives the attempt that
/// just failed. Returns the last error once attempts are exhausted.
pub async fn retry<T, E, Op, Fut, OnRetry>(
    policy: &RetryPolicy,
    label: &str,
    mut op: Op,
    mut on_retry: OnRetry,
) -> Result<T, AttemptError<E>>
where
    E: Retryable + fmt::Display,
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    OnRetry: FnMut(u32),
{
    let attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        let error = match with_timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        tracing::warn!(
            operation = label,
            attempt = attempt + 1,
            max_attempts = attempts,
            error = %error,
            "Call failed"
        );

        if !error.is_transient() || attempt + 1 >= attempts {
            return Err(error);
        }

        on_retry(attempt);
        sleep(policy.delay_for(attempt)).await;
        attempt += 1;
    }
}
