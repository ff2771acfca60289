use std::time::Duration;

use rand::Rng;
use tokenfeed_core::{FeedError, RetryConfig};

/// `min(base * 2^attempt, max_backoff)`; `attempt` is zero-based.
#[must_use]
pub fn exponential_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    cfg.base_backoff
        .checked_mul(factor)
        .unwrap_or(cfg.max_backoff)
        .min(cfg.max_backoff)
}

/// Uniform random duration in `[0, max)`.
#[must_use]
pub fn jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut rng = rand::rng();
    Duration::from_millis(rng.random_range(0..max_ms))
}

/// Wait before retrying after `err` on the given zero-based attempt.
///
/// A 429 waits the server-supplied `Retry-After`, or `max_backoff` without one;
/// other retryable failures back off exponentially with jitter.
#[must_use]
pub fn retry_delay(cfg: &RetryConfig, attempt: u32, err: &FeedError) -> Duration {
    match err {
        FeedError::RateLimited { .. } => err.retry_after().unwrap_or(cfg.max_backoff),
        _ => exponential_delay(cfg, attempt) + jitter(cfg.max_jitter),
    }
}
