mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ProbeStore, record};
use tokenfeed_core::{CacheConfig, keys};
use tokenfeed_middleware::TwoTierCache;

fn cache(store: &Arc<ProbeStore>, capacity: usize) -> TwoTierCache {
    let cfg = CacheConfig {
        memory_capacity: capacity,
        ..CacheConfig::default()
    };
    TwoTierCache::new(cfg, Arc::clone(store) as _)
}

#[tokio::test(start_paused = true)]
async fn fresh_memory_entry_skips_durable_tier() {
    let store = Arc::new(ProbeStore::default());
    let c = cache(&store, 100);
    c.set(&record("0xa", 1.0)).await;

    let hit = c.get("0xa").await.unwrap();
    assert_eq!(hit.market.price_usd, 1.0);
    assert_eq!(store.reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn expired_memory_entry_falls_back_to_durable_and_repopulates() {
    let store = Arc::new(ProbeStore::default());
    let c = cache(&store, 100);
    c.set(&record("0xa", 1.0)).await;

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(c.get("0xa").await.is_some());
    assert_eq!(store.reads(), 1);

    assert!(c.get("0xa").await.is_some());
    assert_eq!(store.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn oldest_insertion_is_evicted_even_if_recently_read() {
    let store = Arc::new(ProbeStore::default());
    let c = cache(&store, 3);
    for (i, addr) in ["0xa", "0xb", "0xc"].iter().enumerate() {
        c.set(&record(addr, i as f64 + 1.0)).await;
    }
    // Reads do not promote.
    c.get("0xa").await.unwrap();
    c.set(&record("0xd", 4.0)).await;

    assert_eq!(c.stats().await.memory_entries, 3);
    let before = store.reads();
    c.get("0xb").await.unwrap();
    assert_eq!(store.reads(), before);
    c.get("0xa").await.unwrap();
    assert_eq!(store.reads(), before + 1);
}

#[tokio::test(start_paused = true)]
async fn get_many_uses_one_durable_round_trip() {
    let store = Arc::new(ProbeStore::default());
    let c = cache(&store, 100);
    c.set(&record("0xa", 1.0)).await;
    c.set(&record("0xb", 2.0)).await;
    tokio::time::advance(Duration::from_secs(31)).await;
    c.set(&record("0xc", 3.0)).await;

    let addrs: Vec<String> = ["0xa", "0xb", "0xc", "0xd"].iter().map(|s| s.to_string()).collect();
    let got = c.get_many(&addrs).await;
    assert_eq!(store.reads(), 1);
    let prices: Vec<Option<f64>> = got.iter().map(|r| r.as_ref().map(|r| r.market.price_usd)).collect();
    assert_eq!(prices, vec![Some(1.0), Some(2.0), Some(3.0), None]);
}

#[tokio::test(start_paused = true)]
async fn store_failures_degrade_to_misses() {
    let store = Arc::new(ProbeStore::default());
    let c = cache(&store, 100);
    store.fail(true);
    c.set(&record("0xa", 1.0)).await;
    // Memory tier still works.
    assert!(c.get("0xa").await.is_some());
    assert!(c.get("0xb").await.is_none());
    assert!(c.get_all().await.is_none());
    c.set_all(&[record("0xa", 1.0)]).await;

    let stats = c.stats().await;
    assert_eq!(stats.durable_token_entries, 0);
    assert_eq!(stats.memory_entries, 1);
}

#[tokio::test(start_paused = true)]
async fn durable_ttl_can_be_changed_for_later_writes() {
    let store = Arc::new(ProbeStore::default());
    let c = cache(&store, 100);
    c.set(&record("0xa", 1.0)).await;
    c.set_durable_ttl(Duration::from_secs(600));
    c.set(&record("0xb", 1.0)).await;
    c.set_all(&[]).await;

    let ttls = store.ttls.lock().unwrap().clone();
    assert_eq!(ttls[0], (keys::token("0xa"), Duration::from_secs(300)));
    assert_eq!(ttls[1], (keys::token("0xb"), Duration::from_secs(600)));
    assert_eq!(ttls[2], (keys::AGGREGATED_ALL.to_string(), Duration::from_secs(300)));
}

#[tokio::test(start_paused = true)]
async fn invalidate_and_clear_cover_both_tiers() {
    let store = Arc::new(ProbeStore::default());
    let c = cache(&store, 100);
    c.set(&record("0xa", 1.0)).await;
    c.set(&record("0xb", 2.0)).await;
    c.set_all(&[record("0xa", 1.0), record("0xb", 2.0)]).await;
    assert_eq!(c.get_all().await.unwrap().len(), 2);

    c.invalidate("0xa").await;
    assert!(c.get("0xa").await.is_none());

    let stats = c.stats().await;
    assert_eq!(stats.durable_token_entries, 1);
    assert_eq!(stats.durable_aggregated_entries, 1);
    assert!(stats.durable_memory_bytes > 0);

    assert_eq!(c.clear().await, 2);
    assert!(c.get("0xb").await.is_none());
    assert!(c.get_all().await.is_none());
    assert_eq!(c.stats().await.memory_entries, 0);
}

#[tokio::test(start_paused = true)]
async fn default_capacity_evicts_only_the_first_insert() {
    let store = Arc::new(ProbeStore::default());
    let c = TwoTierCache::new(CacheConfig::default(), Arc::clone(&store) as _);
    assert_eq!(c.stats().await.memory_capacity, 100);

    for i in 0..=100 {
        c.set(&record(&format!("0x{i}"), 1.0)).await;
    }
    for i in 1..=100 {
        c.get(&format!("0x{i}")).await.unwrap();
    }
    assert_eq!(store.reads(), 0);

    c.get("0x0").await.unwrap();
    assert_eq!(store.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_generation_cannot_rewrite_aggregated_list() {
    let store = Arc::new(ProbeStore::default());
    let c = cache(&store, 100);

    let epoch = c.aggregated_epoch().await;
    assert!(c.set_all_if_current(&[record("0xa", 1.0)], epoch).await);
    assert_eq!(c.get_all().await.unwrap().len(), 1);

    c.invalidate_aggregated().await;
    assert!(!c.set_all_if_current(&[record("0xa", 1.0)], epoch).await);
    assert!(c.get_all().await.is_none());

    let epoch = c.aggregated_epoch().await;
    c.clear().await;
    assert!(!c.set_all_if_current(&[], epoch).await);
    let epoch = c.aggregated_epoch().await;
    assert!(c.set_all_if_current(&[], epoch).await);
    assert_eq!(c.get_all().await, Some(Vec::new()));
}
