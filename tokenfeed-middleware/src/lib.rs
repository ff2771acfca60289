//! tokenfeed-middleware
//!
//! Wrappers that sit between the orchestrator and the outside world:
//!
//! - [`RateLimiter`] enforces a fixed per-provider request window by blocking.
//! - [`RateLimitedClient`] wraps a raw upstream with the limiter and a retry policy.
//! - [`TwoTierCache`] fronts a [`DurableStore`](tokenfeed_core::DurableStore) with a
//!   bounded in-process tier.
//! - [`MemoryStore`] is an in-process durable store with per-key TTL.

mod backoff;
mod cache;
mod client;
mod memory_store;
mod rate_limit;

pub use crate::backoff::{exponential_delay, jitter, retry_delay};
pub use crate::cache::TwoTierCache;
pub use crate::client::RateLimitedClient;
pub use crate::memory_store::MemoryStore;
pub use crate::rate_limit::RateLimiter;
