//! tokenfeed aggregates live token market data from two providers.
//!
//! Overview
//! - [`Aggregator`] serves records from a two-tier cache and, on a miss, fetches
//!   both providers concurrently, merges what came back and caches the result.
//!   Bulk aggregation walks the known token set in small sequential chunks so
//!   upstream pressure stays bounded regardless of how many tokens are tracked.
//! - [`Scheduler`] runs bulk aggregation on a fixed cadence and forwards each
//!   batch to the [`Broadcaster`].
//! - [`Broadcaster`] diffs batches against the last seen records and pushes
//!   price updates, volume spikes and heartbeats to subscribers.
//! - [`Feed`] wires all of the above from a [`FeedConfig`].
//!
//! Provider failures never escalate past "this address could not be aggregated
//! now": one provider answering is enough, and bulk calls skip failed addresses.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokenfeed::{Feed, FeedConfig, StaticMetadata};
//!
//! let metadata = StaticMetadata::from_json(include_str!("tokens.json"))?;
//! let feed = Feed::builder()
//!     .config(FeedConfig::default())
//!     .metadata(Arc::new(metadata))
//!     .build()?;
//! feed.start();
//!
//! let mut sub = feed.connect().await;
//! feed.handle_message(sub.id(), r#"{"type":"subscribe","addresses":["0x..."]}"#).await;
//! while let Some(event) = sub.recv().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```
#![warn(missing_docs)]

mod broadcast;
pub(crate) mod core;
mod feed;
mod scheduler;

pub use crate::broadcast::{BroadcastSummary, Broadcaster, SubscriberId, Subscription};
pub use crate::core::{Aggregator, AggregatorBuilder};
pub use crate::feed::{Feed, FeedBuilder};
pub use crate::scheduler::Scheduler;

pub use tokenfeed_core::{
    BroadcastConfig, BulkConfig, CacheConfig, CacheStats, CanonicalRecord, ClientCommand, Clock,
    DurableStore, FeedConfig, FeedError, FeedEvent, FixedClock, MetadataLookup, PriceUpdate,
    RateLimitConfig, RateLimitStatus, RetryConfig, SchedulerConfig, SchedulerState,
    SchedulerStatus, Source, StaticMetadata, SystemClock, TokenMetadata, UpstreamConfig,
    VolumeSpike, Window,
};
pub use tokenfeed_middleware::{MemoryStore, RateLimitedClient, RateLimiter, TwoTierCache};
pub use tokenfeed_upstream::{DexScreener, GeckoTerminal};
