use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokenfeed_core::{CanonicalRecord, DurableStore, FeedError, TokenMetadata, merge};
use tokenfeed_middleware::MemoryStore;
use tokenfeed_mock::fixtures;

/// Durable store wrapper that counts reads, records write TTLs and can be switched to fail.
#[derive(Default)]
pub struct ProbeStore {
    inner: MemoryStore,
    pub reads: AtomicUsize,
    pub failing: AtomicBool,
    pub ttls: Mutex<Vec<(String, Duration)>>,
}

impl ProbeStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), FeedError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(FeedError::Store("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DurableStore for ProbeStore {
    async fn get(&self, key: &str) -> Result<Option<String>, FeedError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, FeedError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get_many(keys).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), FeedError> {
        self.check()?;
        self.ttls.lock().unwrap().push((key.to_string(), ttl));
        self.inner.set(key, value, ttl).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, FeedError> {
        self.check()?;
        self.inner.keys(pattern).await
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, FeedError> {
        self.check()?;
        self.inner.delete(keys).await
    }

    async fn memory_usage(&self) -> Result<u64, FeedError> {
        self.check()?;
        self.inner.memory_usage().await
    }
}

pub fn record(address: &str, price: f64) -> CanonicalRecord {
    let meta = TokenMetadata::new(address, "Token", "TKN");
    let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    merge(
        &[fixtures::pair("0xpair", price, 1_000_000.0, 250_000.0)],
        None,
        &meta,
        ts,
    )
    .unwrap()
}
