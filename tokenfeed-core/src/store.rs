use std::time::Duration;

use async_trait::async_trait;

use tokenfeed_types::FeedError;

/// Key layout of the durable tier.
pub mod keys {
    /// Prefix of per-address entries.
    pub const TOKEN_PREFIX: &str = "token:";
    /// Prefix of aggregated entries.
    pub const AGGREGATED_PREFIX: &str = "aggregated:";
    /// The full aggregated list.
    pub const AGGREGATED_ALL: &str = "aggregated:all";
    /// Pattern matching every per-address entry.
    pub const TOKEN_PATTERN: &str = "token:*";
    /// Pattern matching every aggregated entry.
    pub const AGGREGATED_PATTERN: &str = "aggregated:*";

    /// Durable key of one address.
    #[must_use]
    pub fn token(address: &str) -> String {
        format!("{TOKEN_PREFIX}{address}")
    }
}

/// Shared key-value store with per-key TTL.
///
/// Atomicity is per key; no operation spans several keys transactionally.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read one key.
    async fn get(&self, key: &str) -> Result<Option<String>, FeedError>;

    /// Read several keys; the result is aligned by index with `keys`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, FeedError>;

    /// Write one key with its own TTL.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), FeedError>;

    /// List live keys matching a glob pattern such as `token:*`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, FeedError>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize, FeedError>;

    /// Approximate bytes held by the store.
    async fn memory_usage(&self) -> Result<u64, FeedError>;
}
