use std::sync::Arc;

use async_trait::async_trait;
use tokenfeed_core::{FeedError, RetryConfig, Source, Upstream};

use crate::backoff::retry_delay;
use crate::rate_limit::RateLimiter;

/// Upstream wrapper adding the provider's request window and retry policy.
///
/// Every attempt, retries included, takes a slot from the limiter. Retryable
/// failures (429, 5xx, network) back off and try again; other 4xx and decode
/// failures return immediately. When attempts run out the last error is returned
/// inside [`FeedError::Exhausted`].
pub struct RateLimitedClient<T> {
    inner: Arc<dyn Upstream<Payload = T>>,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
}

impl<T> RateLimitedClient<T> {
    /// Wrap `inner`. The limiter may be shared with other clients of the same provider.
    #[must_use]
    pub fn new(
        inner: Arc<dyn Upstream<Payload = T>>,
        limiter: Arc<RateLimiter>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            inner,
            limiter,
            retry,
        }
    }

    /// Limiter used by this client.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl<T: Send + 'static> Upstream for RateLimitedClient<T> {
    type Payload = T;

    fn source(&self) -> Source {
        self.inner.source()
    }

    async fn fetch(&self, address: &str) -> Result<T, FeedError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire().await;
            let err = match self.inner.fetch(address).await {
                Ok(payload) => return Ok(payload),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };
            attempt += 1;
            if attempt >= max_attempts {
                tracing::warn!(
                    provider = %self.source(),
                    address,
                    attempts = attempt,
                    error = %err,
                    "giving up after retries"
                );
                return Err(FeedError::Exhausted {
                    provider: self.source().to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            let delay = retry_delay(&self.retry, attempt - 1, &err);
            tracing::warn!(
                provider = %self.source(),
                address,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "retrying upstream request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
