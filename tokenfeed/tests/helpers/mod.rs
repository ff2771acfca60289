// Shared fixtures for the facade tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokenfeed::{
    Aggregator, BulkConfig, CacheConfig, CanonicalRecord, FixedClock, MemoryStore, MetadataLookup,
    TokenMetadata,
};
use tokenfeed_core::{TokenSnapshot, merge};
use tokenfeed_mock::{MockBehavior, MockPairs, MockTokens, fixtures};

pub use fixtures::ADDRESSES;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub agg: Aggregator,
    pub pairs: MockPairs,
    pub tokens: MockTokens,
    pub store: Arc<MemoryStore>,
}

pub fn bulk(chunk_size: usize, delay: Duration) -> BulkConfig {
    BulkConfig {
        chunk_size,
        inter_chunk_delay: delay,
    }
}

pub fn harness_with(
    bulk: BulkConfig,
    cache: CacheConfig,
    metadata: Arc<dyn MetadataLookup>,
) -> Harness {
    init_tracing();
    let pairs = MockPairs::dexscreener();
    let tokens = MockTokens::geckoterminal();
    let store = Arc::new(MemoryStore::default());
    let agg = Aggregator::builder()
        .pairs_upstream(Arc::new(pairs.clone()))
        .token_upstream(Arc::new(tokens.clone()))
        .durable_store(Arc::clone(&store) as _)
        .metadata(metadata)
        .clock(Arc::new(FixedClock(ts())))
        .bulk_config(bulk)
        .cache_config(cache)
        .build()
        .unwrap();
    Harness {
        agg,
        pairs,
        tokens,
        store,
    }
}

pub fn harness() -> Harness {
    harness_with(
        bulk(2, Duration::from_secs(1)),
        CacheConfig::default(),
        Arc::new(fixtures::metadata()),
    )
}

/// Price of the i-th fixture token.
pub fn price_of(i: usize) -> f64 {
    (i as f64 + 1.0) * 0.5
}

/// Script both providers for every fixture address.
pub fn script_all(h: &Harness) {
    for (i, addr) in ADDRESSES.iter().enumerate() {
        let p = price_of(i);
        h.pairs
            .respond(addr, vec![fixtures::pair("0xpair", p, 1_000_000.0, 400_000.0)]);
        h.tokens.respond(addr, fixtures::token(p, 1_000_000.0, 500_000.0));
    }
}

/// Make `addr` fail on both providers.
pub fn fail_everywhere(h: &Harness, addr: &str) {
    h.pairs.respond(addr, Vec::new());
    h.tokens.set(
        addr,
        MockBehavior::Fail(tokenfeed::FeedError::transient("geckoterminal", "status 503")),
    );
}

pub fn token_only(price: f64, reserve: f64) -> TokenSnapshot {
    TokenSnapshot {
        price_usd: Some(price),
        total_reserve_usd: Some(reserve),
        ..TokenSnapshot::default()
    }
}

/// Single-source record with the given price and 24h volume.
pub fn record(address: &str, symbol: &str, price: f64, volume_24h: f64) -> CanonicalRecord {
    let meta = TokenMetadata::new(address, symbol, symbol);
    merge(
        &[fixtures::pair("0xpair", price, volume_24h, 100_000.0)],
        None,
        &meta,
        ts(),
    )
    .unwrap()
}

/// Metadata lookup that never becomes ready.
pub struct NotReady;

impl MetadataLookup for NotReady {
    fn get(&self, _address: &str) -> Option<TokenMetadata> {
        None
    }
    fn list_all(&self) -> Vec<TokenMetadata> {
        Vec::new()
    }
    fn is_ready(&self) -> bool {
        false
    }
    fn count(&self) -> usize {
        0
    }
}
