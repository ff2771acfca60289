use std::sync::Arc;
use std::time::Duration;

use tokenfeed_core::{
    FeedError, PairSnapshot, PairsUpstream, RateLimitConfig, RetryConfig, Source, Upstream,
};
use tokenfeed_middleware::{RateLimitedClient, RateLimiter};
use tokenfeed_mock::{MockBehavior, MockPairs, fixtures};
use tokio::time::Instant;

const ADDR: &str = "0xabc";

fn client(mock: &MockPairs, quota: u32) -> RateLimitedClient<Vec<PairSnapshot>> {
    let limiter = Arc::new(RateLimiter::new(
        Source::DexScreener,
        RateLimitConfig::per_minute(quota),
    ));
    let raw: Arc<PairsUpstream> = Arc::new(mock.clone());
    RateLimitedClient::new(raw, limiter, RetryConfig::default())
}

fn transient() -> MockBehavior<Vec<PairSnapshot>> {
    MockBehavior::Fail(FeedError::transient("dexscreener", "status 503"))
}

#[tokio::test(start_paused = true)]
async fn transient_failures_back_off_then_succeed() {
    let mock = MockPairs::dexscreener();
    mock.respond(ADDR, vec![fixtures::pair("0xp", 1.0, 10.0, 5.0)]);
    mock.push(ADDR, transient());
    mock.push(ADDR, transient());

    let c = client(&mock, 300);
    let start = Instant::now();
    let pairs = c.fetch(ADDR).await.unwrap();
    let waited = start.elapsed();

    assert_eq!(pairs.len(), 1);
    assert_eq!(mock.calls_for(ADDR), 3);
    // 2s + 4s plus up to 1s jitter each
    assert!(waited >= Duration::from_secs(6), "waited {waited:?}");
    assert!(waited < Duration::from_secs(8), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn client_error_is_not_retried() {
    let mock = MockPairs::dexscreener();
    mock.set(ADDR, MockBehavior::Fail(FeedError::client("dexscreener", 400, "bad address")));
    let c = client(&mock, 300);
    let err = c.fetch(ADDR).await.unwrap_err();
    assert!(matches!(err, FeedError::ClientError { status: 400, .. }));
    assert_eq!(mock.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn persistent_failure_exhausts_after_max_attempts() {
    let mock = MockPairs::dexscreener();
    mock.set(ADDR, transient());
    let c = client(&mock, 300);
    let err = c.fetch(ADDR).await.unwrap_err();
    match err {
        FeedError::Exhausted { attempts, last, .. } => {
            assert_eq!(attempts, 5);
            assert!(matches!(*last, FeedError::Transient { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_honours_retry_after() {
    let mock = MockPairs::dexscreener();
    mock.respond(ADDR, Vec::new());
    mock.push(ADDR, MockBehavior::Fail(FeedError::rate_limited("dexscreener", Some(7_000))));
    let c = client(&mock, 300);
    let start = Instant::now();
    c.fetch(ADDR).await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_without_hint_waits_max_backoff() {
    let mock = MockPairs::dexscreener();
    mock.respond(ADDR, Vec::new());
    mock.push(ADDR, MockBehavior::Fail(FeedError::rate_limited("dexscreener", None)));
    let c = client(&mock, 300);
    let start = Instant::now();
    c.fetch(ADDR).await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn retries_take_limiter_slots() {
    let mock = MockPairs::dexscreener();
    mock.respond(ADDR, Vec::new());
    mock.push(ADDR, transient());
    let c = client(&mock, 1);
    let start = Instant::now();
    c.fetch(ADDR).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(60));
    assert_eq!(c.limiter().status().remaining, 0);
}
