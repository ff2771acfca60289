//! tokenfeed-upstream
//!
//! Raw HTTP connectors for the two market-data providers. Each connector maps
//! provider JSON into the normalized snapshots of `tokenfeed-core` and classifies
//! HTTP failures into [`FeedError`](tokenfeed_core::FeedError) variants the retry
//! layer understands. Use [`DexScreener::rate_limited`] and
//! [`GeckoTerminal::rate_limited`] to obtain clients wrapped with the provider's
//! request window and retry policy.

mod dexscreener;
mod geckoterminal;
mod http;

use std::sync::Arc;

use tokenfeed_core::{Source, Upstream, UpstreamConfig};
use tokenfeed_middleware::{RateLimitedClient, RateLimiter};

pub use crate::dexscreener::DexScreener;
pub use crate::geckoterminal::GeckoTerminal;

fn wrap<T: Send + 'static>(
    raw: Arc<dyn Upstream<Payload = T>>,
    source: Source,
    cfg: &UpstreamConfig,
) -> RateLimitedClient<T> {
    let limiter = Arc::new(RateLimiter::new(source, cfg.rate_limit));
    RateLimitedClient::new(raw, limiter, cfg.retry)
}
