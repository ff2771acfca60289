use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use glob::Pattern;
use tokenfeed_core::{DurableStore, FeedError};

#[derive(Clone)]
struct Stored {
    value: String,
    ttl: Duration,
}

// Each write carries its own lifetime; an overwrite restarts it.
struct PerKeyTtl;

impl Expiry<String, Stored> for PerKeyTtl {
    fn expire_after_create(&self, _key: &String, value: &Stored, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process [`DurableStore`] backed by a concurrent moka cache.
///
/// Suitable for a single node or tests; deployments sharing state across
/// processes plug in their own store behind the same trait.
pub struct MemoryStore {
    inner: Cache<String, Stored>,
}

impl MemoryStore {
    /// Create a store holding at most `max_entries` keys.
    #[must_use]
    pub fn new(max_entries: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerKeyTtl)
                .build(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, FeedError> {
        Ok(self.inner.get(key).await.map(|s| s.value))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, FeedError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.inner.get(key).await.map(|s| s.value));
        }
        Ok(out)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), FeedError> {
        self.inner.insert(key.to_string(), Stored { value, ttl }).await;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, FeedError> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| FeedError::InvalidArg(format!("key pattern {pattern:?}: {e}")))?;
        let mut matched: Vec<String> = self
            .inner
            .iter()
            .filter(|(k, _)| pattern.matches(k))
            .map(|(k, _)| k.as_ref().clone())
            .collect();
        matched.sort();
        Ok(matched)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, FeedError> {
        let mut removed = 0;
        for key in keys {
            if self.inner.remove(key).await.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn memory_usage(&self) -> Result<u64, FeedError> {
        let bytes: usize = self
            .inner
            .iter()
            .map(|(k, v)| k.len() + v.value.len())
            .sum();
        Ok(u64::try_from(bytes).unwrap_or(u64::MAX))
    }
}
