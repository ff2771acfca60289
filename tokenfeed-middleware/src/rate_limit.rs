//! Fixed-window request limiter.
//!
//! Every call through [`RateLimiter::acquire`] consumes one slot of the current
//! window. When the window is spent the caller sleeps until the boundary instead of
//! failing, so the quota is a hard ceiling that never drops requests.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokenfeed_core::{RateLimitConfig, RateLimitStatus, Source};
use tokio::time::Instant;

/// Shared request window for one provider.
pub struct RateLimiter {
    source: Source,
    max_per_window: u32,
    window: Duration,
    runtime: Mutex<WindowRuntime>,
}

struct WindowRuntime {
    count: u32,
    // None until the first call opens a window.
    reset_at: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter. A zero quota is raised to one request per window.
    #[must_use]
    pub fn new(source: Source, config: RateLimitConfig) -> Self {
        Self {
            source,
            max_per_window: config.max_per_window.max(1),
            window: config.window,
            runtime: Mutex::new(WindowRuntime {
                count: 0,
                reset_at: None,
            }),
        }
    }

    /// Provider this limiter belongs to.
    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    /// Take one slot, waiting for the next window when the current one is spent.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_acquire_at(Instant::now()) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tracing::debug!(
                provider = %self.source,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "rate limit window exhausted; waiting for reset"
            );
            tokio::time::sleep(wait).await;
        }
    }

    // Check-and-increment under the lock; returns the wait until reset when full.
    fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut rt = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        match rt.reset_at {
            Some(reset_at) if now < reset_at => {}
            _ => {
                rt.count = 0;
                rt.reset_at = Some(now + self.window);
            }
        }
        if rt.count < self.max_per_window {
            rt.count += 1;
            return Ok(());
        }
        let reset_at = rt.reset_at.unwrap_or(now);
        Err(reset_at.saturating_duration_since(now).max(Duration::from_millis(1)))
    }

    /// Remaining quota in the current window.
    #[must_use]
    pub fn status(&self) -> RateLimitStatus {
        let rt = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let (remaining, reset_in) = match rt.reset_at {
            Some(reset_at) if now < reset_at => (
                self.max_per_window.saturating_sub(rt.count),
                reset_at - now,
            ),
            _ => (self.max_per_window, Duration::ZERO),
        };
        RateLimitStatus {
            provider: self.source,
            remaining,
            total: self.max_per_window,
            reset_in,
        }
    }
}
