use std::sync::Arc;
use std::time::Duration;

use tokenfeed_core::{RateLimitConfig, Source};
use tokenfeed_middleware::RateLimiter;
use tokio::time::Instant;

fn limiter(max: u32) -> RateLimiter {
    RateLimiter::new(Source::DexScreener, RateLimitConfig::per_minute(max))
}

#[tokio::test(start_paused = true)]
async fn requests_within_quota_do_not_wait() {
    let rl = limiter(3);
    let start = Instant::now();
    for _ in 0..3 {
        rl.acquire().await;
    }
    assert_eq!(start.elapsed(), Duration::ZERO);

    let st = rl.status();
    assert_eq!(st.remaining, 0);
    assert_eq!(st.total, 3);
    assert_eq!(st.reset_in, Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn request_over_quota_blocks_until_window_reset() {
    let rl = limiter(3);
    let start = Instant::now();
    for _ in 0..4 {
        rl.acquire().await;
    }
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(60), "waited {waited:?}");
    assert!(waited < Duration::from_secs(61), "waited {waited:?}");

    let st = rl.status();
    assert_eq!(st.remaining, 2);
}

#[tokio::test(start_paused = true)]
async fn each_boundary_resets_once() {
    let rl = limiter(3);
    let start = Instant::now();
    for _ in 0..7 {
        rl.acquire().await;
    }
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(120) && waited < Duration::from_secs(121));
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_never_exceed_quota() {
    let rl = Arc::new(limiter(3));
    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let rl = Arc::clone(&rl);
        handles.push(tokio::spawn(async move {
            rl.acquire().await;
            start.elapsed()
        }));
    }
    let mut elapsed = Vec::new();
    for h in handles {
        elapsed.push(h.await.unwrap());
    }
    elapsed.sort();
    let immediate = elapsed.iter().filter(|d| **d < Duration::from_secs(60)).count();
    assert_eq!(immediate, 3);
    assert!(elapsed[3..].iter().all(|d| *d >= Duration::from_secs(60)));
}

#[tokio::test(start_paused = true)]
async fn idle_limiter_reports_full_quota() {
    let rl = limiter(30);
    let st = rl.status();
    assert_eq!(st.provider, Source::DexScreener);
    assert_eq!(st.remaining, 30);
    assert_eq!(st.reset_in, Duration::ZERO);

    rl.acquire().await;
    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(rl.status().remaining, 30);
}
