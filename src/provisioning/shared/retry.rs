use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound for a single backoff delay
const MAX_DELAY_MS: u64 = 30_000;

/// Bounded retry settings shared by all batch actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts after the first one; 0 disables retrying
    pub retry_limit: u32,

    /// Base delay in milliseconds for exponential backoff
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_limit: 0,
            retry_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_limit: u32, retry_delay_ms: u64) -> Self {
        Self {
            retry_limit,
            retry_delay_ms,
        }
    }

    pub fn backoff(&self) -> ExponentialBackoffRetry {
        ExponentialBackoffRetry::new(self.retry_delay_ms, self.retry_limit)
    }
}

/// Exponential backoff retry handler with jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoffRetry {
    /// Base delay in milliseconds
    base_delay_ms: u64,

    /// Maximum number of retry attempts
    max_retries: u32,

    /// Attempts made by the last `execute` call
    attempts: u32,
}

impl ExponentialBackoffRetry {
    /// Create a new retry handler
    pub fn new(base_delay_ms: u64, max_retries: u32) -> Self {
        Self {
            base_delay_ms,
            max_retries,
            attempts: 0,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-transient error,
    /// or the retry budget is spent. The last error is returned as-is.
    pub async fn execute<F, Fut, T, E>(&mut self, mut operation: F, is_transient: impl Fn(&E) -> bool) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.attempts = 0;

        loop {
            let attempt = self.attempts;
            self.attempts += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt >= self.max_retries || !is_transient(&e) {
                        return Err(e);
                    }

                    let delay_ms = self.calculate_delay(attempt);
                    tracing::warn!(
                        "operation failed (attempt {}/{}): {} - retrying in {}ms",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay_ms
                    );

                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    /// Calculate delay for an attempt using exponential backoff with ±10% jitter
    fn calculate_delay(&self, attempt: u32) -> u64 {
        let exponential_delay = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(MAX_DELAY_MS);
        let jitter_range = exponential_delay / 10;

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(0..=jitter_range * 2) as i64 - jitter_range as i64;

        let final_delay = (exponential_delay as i64 + jitter).max(0) as u64;

        final_delay.min(MAX_DELAY_MS)
    }

    /// Attempts made by the most recent `execute` call
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
