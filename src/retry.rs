//! Bounded retry with exponential backoff.
//!
//! Every network call in the pipeline (OCR, card generation, chat replies)
//! goes through [`retry_with_backoff`]. Only errors the injected classifier
//! accepts are retried, by default [`is_rate_limited`], i.e. HTTP 429.
//! Anything else fails fast on the very first attempt.
//!
//! ## Delay sequence
//!
//! The delay before retry `k` (0-indexed) is `base_delay * 2^k`, with no
//! jitter. With the default 2 s base and 3 retries the waits are
//! 2 s → 4 s → 8 s, i.e. at most 14 s of back-off per call. Each single delay
//! is capped at [`RetryPolicy::max_delay_ms`] so raising `max_retries` cannot
//! produce unbounded sleeps.

use crate::error::{StatusCoded, RATE_LIMIT_STATUS};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Default ceiling for a single backoff delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the initial attempt. Default: 3.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds. Default: 2000.
    pub base_delay_ms: u64,
    /// Ceiling for any single delay, in milliseconds. Default: 30 000.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            ..Self::default()
        }
    }

    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Sum of every delay the policy can incur when all retries are used.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_retries).map(|k| self.delay_for(k)).sum()
    }
}

/// Default classifier: retry only on a 429 status.
pub fn is_rate_limited<E: StatusCoded>(error: &E) -> bool {
    error.status_code() == Some(RATE_LIMIT_STATUS)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent.
///
/// At most `policy.max_retries + 1` calls are made. On exhaustion the last
/// error is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    is_retryable: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                info!(
                    "Retryable error, retrying in {}ms (attempt {}/{})",
                    delay.as_millis(),
                    attempt + 1,
                    policy.max_retries + 1
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
