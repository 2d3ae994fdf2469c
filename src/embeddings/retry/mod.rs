#[cfg(test)]
mod tests;

use anyhow::Result;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry with exponential backoff.
///
/// Attempt `n` (1-based) failing transiently waits
/// `base_delay * multiplier^(n-1)` before attempt `n+1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Backoff delay after the given 1-based attempt fails.
    #[inline]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Failure classification produced by a retried operation.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth retrying: timeouts, transport failures, rate limits, 5xx.
    Transient(anyhow::Error),
    /// Retrying cannot help: bad request, auth failure, parse error.
    Permanent(anyhow::Error),
}

impl AttemptError {
    fn into_inner(self) -> anyhow::Error {
        match self {
            AttemptError::Transient(e) | AttemptError::Permanent(e) => e,
        }
    }
}

/// Run `op` under the policy, sleeping via `sleep` between transient
/// failures. The sleep function is injected so the backoff schedule is
/// testable without waiting on a clock.
#[inline]
pub fn execute_with_retry<T, F, S>(policy: &RetryPolicy, mut op: F, mut sleep: S) -> Result<T>
where
    F: FnMut(u32) -> Result<T, AttemptError>,
    S: FnMut(Duration),
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        debug!("attempt {}/{}", attempt, policy.max_attempts);

        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(AttemptError::Permanent(error)) => {
                warn!("non-retryable error on attempt {}: {}", attempt, error);
                return Err(error);
            }
            Err(AttemptError::Transient(error)) => {
                warn!(
                    "transient error on attempt {}/{}: {}",
                    attempt, policy.max_attempts, error
                );
                last_error = Some(error);

                if attempt < policy.max_attempts {
                    sleep(policy.delay_for_attempt(attempt));
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("operation failed with no attempts executed")))
}
