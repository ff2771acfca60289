//! Configuration types shared across the orchestrator, middleware and connectors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed-window request quota for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum number of requests dispatched within one window.
    pub max_per_window: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Quota of `max_per_window` requests per minute.
    #[must_use]
    pub const fn per_minute(max_per_window: u32) -> Self {
        Self {
            max_per_window,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Exponential backoff applied to retryable upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `base * 2^n` before jitter.
    pub base_backoff: Duration,
    /// Upper bound for the exponential part, and the wait used for a 429 without `Retry-After`.
    pub max_backoff: Duration,
    /// Uniform random jitter in `[0, max_jitter)` added to exponential waits.
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
        }
    }
}

/// Two-tier cache sizing and lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of in-process entries.
    pub memory_ttl: Duration,
    /// Maximum number of in-process entries; the oldest insertion is evicted beyond it.
    pub memory_capacity: usize,
    /// Default lifetime of per-address durable entries.
    pub durable_ttl: Duration,
    /// Lifetime of the durable full aggregated list.
    pub aggregated_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl: Duration::from_secs(30),
            memory_capacity: 100,
            durable_ttl: Duration::from_secs(300),
            aggregated_ttl: Duration::from_secs(300),
        }
    }
}

/// Chunked fan-out used by bulk aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Addresses fetched concurrently per chunk. Values below 1 are treated as 1.
    pub chunk_size: usize,
    /// Pause between consecutive chunks.
    pub inter_chunk_delay: Duration,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2,
            inter_chunk_delay: Duration::from_secs(1),
        }
    }
}

/// Periodic refresh settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cadence of scheduled bulk aggregation.
    pub interval: Duration,
    /// Smallest accepted cadence; shorter intervals are raised to it.
    pub min_interval: Duration,
    /// Durable default TTL applied when the scheduler starts, independent of the cadence.
    pub fault_tolerant_ttl: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            min_interval: Duration::from_secs(1),
            fault_tolerant_ttl: Duration::from_secs(300),
        }
    }
}

/// Subscriber channel and delta thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Per-subscriber bounded channel capacity.
    pub subscriber_buffer: usize,
    /// Minimum new/previous 24h volume ratio reported as a spike.
    pub volume_spike_ratio: f64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
            volume_spike_ratio: 1.5,
        }
    }
}

/// HTTP connector settings for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Client-side I/O timeout per request.
    pub request_timeout: Duration,
    /// Network slug for providers that scope tokens by chain.
    pub network: String,
    /// Request quota.
    pub rate_limit: RateLimitConfig,
    /// Retry policy.
    pub retry: RetryConfig,
}

impl UpstreamConfig {
    /// Defaults for the DexScreener token-pairs API.
    #[must_use]
    pub fn dexscreener() -> Self {
        Self {
            base_url: "https://api.dexscreener.com".to_string(),
            request_timeout: Duration::from_secs(10),
            network: String::new(),
            rate_limit: RateLimitConfig::per_minute(300),
            retry: RetryConfig::default(),
        }
    }

    /// Defaults for the GeckoTerminal token API.
    #[must_use]
    pub fn geckoterminal() -> Self {
        Self {
            base_url: "https://api.geckoterminal.com/api/v2".to_string(),
            request_timeout: Duration::from_secs(10),
            network: "eth".to_string(),
            rate_limit: RateLimitConfig::per_minute(30),
            retry: RetryConfig::default(),
        }
    }
}

/// Global configuration for a tokenfeed instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Cache tiers.
    pub cache: CacheConfig,
    /// Bulk aggregation chunking.
    pub bulk: BulkConfig,
    /// Periodic refresh.
    pub scheduler: SchedulerConfig,
    /// Subscriber fan-out.
    pub broadcast: BroadcastConfig,
    /// Provider A connector.
    pub dexscreener: UpstreamConfig,
    /// Provider B connector.
    pub geckoterminal: UpstreamConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            bulk: BulkConfig::default(),
            scheduler: SchedulerConfig::default(),
            broadcast: BroadcastConfig::default(),
            dexscreener: UpstreamConfig::dexscreener(),
            geckoterminal: UpstreamConfig::geckoterminal(),
        }
    }
}
