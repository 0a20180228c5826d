//! Bounded retry with exponential backoff.
//!
//! Every outbound venue call goes through [`RetryPolicy::run`]. Only
//! transient errors are retried: 5xx and 429 venue answers, and errors whose
//! message matches the transient vocabulary.
//!
//! Order placement is retried like any other call. The venue offers no
//! idempotency key, so a retry after a lost response can submit the same
//! order twice. This is an accepted trade-off.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ExecError;

/// Attempts per call, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; doubles afterwards.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Lowercase fragments that mark an error as transient.
const TRANSIENT_PATTERNS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "connection closed",
    "econnreset",
    "econnrefused",
    "enotfound",
    "etimedout",
    "dns",
    "socket hang up",
    "rate limit",
    "too many requests",
    "service unavailable",
    "bad gateway",
    "gateway timeout",
    "http 429",
    "http 500",
    "http 502",
    "http 503",
    "http 504",
];

/// Whether an error message describes a transient failure.
pub fn is_transient(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|pattern| message.contains(pattern))
}

/// Retry policy for venue calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is at least 1.
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Total attempts per call
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the failed `attempt` (1-indexed): 1s, 2s, 4s, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }

    /// Run `call` until it succeeds, fails permanently, or the attempt
    /// budget is spent. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ExecError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExecError>>,
    {
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let backoff = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient venue error, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(operation, attempts = attempt, error = %e, "Retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
