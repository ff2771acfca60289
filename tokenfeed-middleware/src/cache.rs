//! Two-tier record cache.
//!
//! The in-process tier is a bounded map with a short TTL whose eviction follows
//! insertion order: reads never promote an entry. The durable tier is a shared
//! [`DurableStore`] holding serialized records under `token:{address}` and the full
//! aggregated list under `aggregated:all`. Durable failures are logged and treated
//! as misses so callers fall through to a live fetch.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use tokenfeed_core::{CacheConfig, CacheStats, CanonicalRecord, DurableStore, keys};
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry {
    record: CanonicalRecord,
    expires_at: Instant,
}

/// In-process tier in front of a durable store.
pub struct TwoTierCache {
    memory: Mutex<LruCache<String, Entry>>,
    memory_ttl: Duration,
    durable: Arc<dyn DurableStore>,
    durable_ttl_ms: AtomicU64,
    aggregated_ttl: Duration,
    // Generation of the aggregated list, held while that key is written or deleted.
    aggregated_epoch: Mutex<u64>,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl TwoTierCache {
    /// Build a cache over `durable`. A zero capacity is raised to one entry.
    #[must_use]
    pub fn new(config: CacheConfig, durable: Arc<dyn DurableStore>) -> Self {
        let capacity = NonZeroUsize::new(config.memory_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            memory_ttl: config.memory_ttl,
            durable,
            durable_ttl_ms: AtomicU64::new(millis(config.durable_ttl)),
            aggregated_ttl: config.aggregated_ttl,
            aggregated_epoch: Mutex::new(0),
        }
    }

    /// Current default TTL of per-address durable entries.
    #[must_use]
    pub fn durable_ttl(&self) -> Duration {
        Duration::from_millis(self.durable_ttl_ms.load(Ordering::Relaxed))
    }

    /// Replace the default TTL used for subsequent per-address durable writes.
    pub fn set_durable_ttl(&self, ttl: Duration) {
        self.durable_ttl_ms.store(millis(ttl), Ordering::Relaxed);
    }

    async fn memory_get(&self, address: &str) -> Option<CanonicalRecord> {
        let mut mem = self.memory.lock().await;
        let fresh = mem
            .peek(address)
            .map(|e| Instant::now() < e.expires_at)?;
        if fresh {
            mem.peek(address).map(|e| e.record.clone())
        } else {
            mem.pop(address);
            None
        }
    }

    async fn memory_put(&self, record: CanonicalRecord) {
        let expires_at = Instant::now() + self.memory_ttl;
        let key = record.address.clone();
        let mut mem = self.memory.lock().await;
        // A rewrite counts as a fresh insertion.
        if let Some((evicted, _)) = mem.push(key.clone(), Entry { record, expires_at })
            && evicted != key
        {
            tracing::trace!(address = %evicted, "evicted oldest in-process cache entry");
        }
    }

    fn decode(key: &str, raw: &str) -> Option<CanonicalRecord> {
        match serde_json::from_str::<CanonicalRecord>(raw) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(key, error = %err, "discarding undecodable durable cache entry");
                None
            }
        }
    }

    /// Look up one address: in-process first, then durable (repopulating in-process).
    pub async fn get(&self, address: &str) -> Option<CanonicalRecord> {
        if let Some(hit) = self.memory_get(address).await {
            tracing::trace!(address, tier = "memory", "cache hit");
            return Some(hit);
        }
        let key = keys::token(address);
        let raw = match self.durable.get(&key).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(address, error = %err, "durable cache read failed; treating as miss");
                return None;
            }
        };
        let record = Self::decode(&key, &raw)?;
        tracing::trace!(address, tier = "durable", "cache hit");
        self.memory_put(record.clone()).await;
        Some(record)
    }

    /// Look up several addresses with a single durable round-trip for the
    /// in-process misses. The result is aligned by index with `addresses`.
    pub async fn get_many(&self, addresses: &[String]) -> Vec<Option<CanonicalRecord>> {
        let mut out = Vec::with_capacity(addresses.len());
        let mut missing: Vec<usize> = Vec::new();
        for (i, address) in addresses.iter().enumerate() {
            let hit = self.memory_get(address).await;
            if hit.is_none() {
                missing.push(i);
            }
            out.push(hit);
        }
        if missing.is_empty() {
            return out;
        }

        let durable_keys: Vec<String> = missing
            .iter()
            .map(|&i| keys::token(&addresses[i]))
            .collect();
        let raws = match self.durable.get_many(&durable_keys).await {
            Ok(raws) => raws,
            Err(err) => {
                tracing::warn!(error = %err, "durable bulk read failed; treating as misses");
                return out;
            }
        };
        for ((&i, key), raw) in missing.iter().zip(&durable_keys).zip(raws) {
            let Some(record) = raw.as_deref().and_then(|r| Self::decode(key, r)) else {
                continue;
            };
            self.memory_put(record.clone()).await;
            out[i] = Some(record);
        }
        out
    }

    /// Write a record to both tiers.
    pub async fn set(&self, record: &CanonicalRecord) {
        self.memory_put(record.clone()).await;
        let key = keys::token(&record.address);
        match serde_json::to_string(record) {
            Ok(raw) => {
                if let Err(err) = self.durable.set(&key, raw, self.durable_ttl()).await {
                    tracing::warn!(address = %record.address, error = %err, "durable cache write failed");
                }
            }
            Err(err) => {
                tracing::warn!(address = %record.address, error = %err, "failed to serialize record");
            }
        }
    }

    /// Read the full aggregated list from the durable tier.
    pub async fn get_all(&self) -> Option<Vec<CanonicalRecord>> {
        let raw = match self.durable.get(keys::AGGREGATED_ALL).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(error = %err, "durable read of aggregated list failed; treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(list) => Some(list),
            Err(err) => {
                tracing::warn!(error = %err, "discarding undecodable aggregated list");
                None
            }
        }
    }

    /// Generation of the aggregated list; bumped by every invalidation of it.
    pub async fn aggregated_epoch(&self) -> u64 {
        *self.aggregated_epoch.lock().await
    }

    /// Overwrite the full aggregated list unless it was invalidated after `epoch`
    /// was read. Returns false when the write was skipped.
    pub async fn set_all_if_current(&self, records: &[CanonicalRecord], epoch: u64) -> bool {
        let current = self.aggregated_epoch.lock().await;
        if *current != epoch {
            tracing::debug!(
                records = records.len(),
                "aggregated list invalidated during bulk run; not rewriting it"
            );
            return false;
        }
        self.write_all(records).await;
        true
    }

    /// Overwrite the full aggregated list in the durable tier.
    pub async fn set_all(&self, records: &[CanonicalRecord]) {
        let _epoch = self.aggregated_epoch.lock().await;
        self.write_all(records).await;
    }

    async fn write_all(&self, records: &[CanonicalRecord]) {
        let raw = match serde_json::to_string(records) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize aggregated list");
                return;
            }
        };
        if let Err(err) = self
            .durable
            .set(keys::AGGREGATED_ALL, raw, self.aggregated_ttl)
            .await
        {
            tracing::warn!(error = %err, "durable write of aggregated list failed");
        }
    }

    /// Drop one address from both tiers.
    pub async fn invalidate(&self, address: &str) {
        self.memory.lock().await.pop(address);
        if let Err(err) = self.durable.delete(&[keys::token(address)]).await {
            tracing::warn!(address, error = %err, "durable cache delete failed");
        }
    }

    /// Drop the aggregated list from the durable tier.
    pub async fn invalidate_aggregated(&self) {
        let mut epoch = self.aggregated_epoch.lock().await;
        *epoch += 1;
        if let Err(err) = self
            .durable
            .delete(&[keys::AGGREGATED_ALL.to_string()])
            .await
        {
            tracing::warn!(error = %err, "durable delete of aggregated list failed");
        }
    }

    /// Drop every cached record from both tiers. Returns the number of durable keys removed.
    pub async fn clear(&self) -> usize {
        let mut epoch = self.aggregated_epoch.lock().await;
        *epoch += 1;
        self.memory.lock().await.clear();
        let mut removed = 0;
        for pattern in [keys::TOKEN_PATTERN, keys::AGGREGATED_PATTERN] {
            let matched = match self.durable.keys(pattern).await {
                Ok(matched) => matched,
                Err(err) => {
                    tracing::warn!(pattern, error = %err, "durable key scan failed");
                    continue;
                }
            };
            if matched.is_empty() {
                continue;
            }
            match self.durable.delete(&matched).await {
                Ok(n) => removed += n,
                Err(err) => tracing::warn!(pattern, error = %err, "durable bulk delete failed"),
            }
        }
        removed
    }

    /// Occupancy of both tiers. Durable figures read as zero when the store fails.
    pub async fn stats(&self) -> CacheStats {
        let (memory_entries, memory_capacity) = {
            let mem = self.memory.lock().await;
            let now = Instant::now();
            let live = mem.iter().filter(|(_, e)| now < e.expires_at).count();
            (live, mem.cap().get())
        };
        let count = |pattern: &'static str| async move {
            self.durable
                .keys(pattern)
                .await
                .map(|k| k.len())
                .unwrap_or_else(|err| {
                    tracing::warn!(pattern, error = %err, "durable key scan failed");
                    0
                })
        };
        let durable_token_entries = count(keys::TOKEN_PATTERN).await;
        let durable_aggregated_entries = count(keys::AGGREGATED_PATTERN).await;
        let durable_memory_bytes = self.durable.memory_usage().await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "durable memory usage query failed");
            0
        });
        CacheStats {
            memory_entries,
            memory_capacity,
            durable_token_entries,
            durable_aggregated_entries,
            durable_memory_bytes,
        }
    }
}
