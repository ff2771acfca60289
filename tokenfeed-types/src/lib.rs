//! Tokenfeed-specific data transfer objects and configuration primitives.
//!
//! Everything that crosses a crate boundary lives here: the canonical market
//! record and its building blocks, provider identities, the unified error type,
//! subscriber events and commands, status snapshots, and configuration structs.
#![warn(missing_docs)]

mod config;
mod error;
mod events;
mod record;
mod source;
mod status;

pub use config::{
    BroadcastConfig, BulkConfig, CacheConfig, FeedConfig, RateLimitConfig, RetryConfig,
    SchedulerConfig, UpstreamConfig,
};
pub use error::FeedError;
pub use events::{ClientCommand, FeedEvent, PriceUpdate, VolumeSpike};
pub use record::{
    CanonicalRecord, MarketFields, TokenMetadata, TxnCounts, TxnWindows, Window, WindowMetrics,
    normalize_address,
};
pub use source::Source;
pub use status::{CacheStats, RateLimitStatus, SchedulerState, SchedulerStatus};
