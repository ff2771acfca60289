mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::*;
use tokenfeed::{
    BroadcastConfig, Broadcaster, CacheConfig, FeedEvent, FixedClock, Scheduler, SchedulerConfig,
    SchedulerState,
};
use tokenfeed_mock::fixtures;

fn scheduler(h: &Harness) -> (Scheduler, Broadcaster) {
    let b = Broadcaster::new(BroadcastConfig::default(), Arc::new(FixedClock(ts())));
    let s = Scheduler::new(h.agg.clone(), b.clone(), SchedulerConfig::default());
    (s, b)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn start_runs_immediately_and_sets_fault_tolerant_ttl() {
    let cache = CacheConfig {
        durable_ttl: Duration::from_secs(60),
        ..CacheConfig::default()
    };
    let h = harness_with(bulk(2, Duration::ZERO), cache, Arc::new(fixtures::metadata()));
    script_all(&h);
    let (s, _b) = scheduler(&h);

    assert_eq!(h.agg.cache().durable_ttl(), Duration::from_secs(60));
    assert!(s.start(Duration::from_secs(60)));
    assert_eq!(h.agg.cache().durable_ttl(), Duration::from_secs(300));
    settle().await;

    let st = s.status();
    assert_eq!(st.state, SchedulerState::Running);
    assert_eq!(st.interval, Some(Duration::from_secs(60)));
    assert_eq!(st.runs, 1);
    assert_eq!(st.last_count, 5);
    assert_eq!(st.last_run, Some(ts()));
    assert_eq!(h.pairs.calls(), 5);
    s.stop();
}

#[tokio::test(start_paused = true)]
async fn ticks_feed_the_broadcaster() {
    let h = harness_with(bulk(2, Duration::ZERO), CacheConfig::default(), Arc::new(fixtures::metadata()));
    script_all(&h);
    let (s, b) = scheduler(&h);
    let mut sub = b.connect(Vec::new()).await;

    s.start(Duration::from_secs(60));
    settle().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(s.status().runs, 2);
    assert_eq!(b.tracked_addresses().await.len(), 5);
    let kinds: Vec<&str> = std::iter::from_fn(|| sub.try_recv())
        .map(|e| e.kind())
        .collect();
    assert_eq!(kinds, vec!["initial_data", "heartbeat", "heartbeat"]);
    s.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_halts_ticks() {
    let h = harness_with(bulk(2, Duration::ZERO), CacheConfig::default(), Arc::new(fixtures::metadata()));
    script_all(&h);
    let (s, _b) = scheduler(&h);

    assert!(s.start(Duration::from_secs(5)));
    assert!(!s.start(Duration::from_secs(5)));
    settle().await;
    assert!(s.stop());
    assert!(!s.stop());

    let runs = s.status().runs;
    tokio::time::sleep(Duration::from_secs(60)).await;
    let st = s.status();
    assert_eq!(st.state, SchedulerState::Stopped);
    assert_eq!(st.interval, None);
    assert_eq!(st.runs, runs);
}

#[tokio::test(start_paused = true)]
async fn manual_trigger_leaves_schedule_alone() {
    let h = harness_with(bulk(2, Duration::ZERO), CacheConfig::default(), Arc::new(fixtures::metadata()));
    script_all(&h);
    let (s, _b) = scheduler(&h);

    assert_eq!(s.trigger().await.unwrap(), 5);
    assert_eq!(s.status().state, SchedulerState::Stopped);

    s.start(Duration::from_secs(60));
    settle().await;
    assert_eq!(s.trigger().await.unwrap(), 5);
    let st = s.status();
    assert_eq!(st.runs, 3);
    assert_eq!(st.interval, Some(Duration::from_secs(60)));
    s.stop();
}

#[tokio::test(start_paused = true)]
async fn failing_ticks_are_counted_and_timer_survives() {
    let h = harness_with(bulk(2, Duration::ZERO), CacheConfig::default(), Arc::new(NotReady));
    let (s, _b) = scheduler(&h);

    s.start(Duration::from_secs(1));
    settle().await;
    assert_eq!(s.status().failures, 1);
    tokio::time::sleep(Duration::from_secs(2)).await;
    let st = s.status();
    assert_eq!(st.failures, 3);
    assert_eq!(st.runs, 0);
    assert_eq!(st.state, SchedulerState::Running);
    assert!(s.trigger().await.is_err());
    s.stop();
}

#[tokio::test(start_paused = true)]
async fn interval_is_raised_to_minimum() {
    let h = harness_with(bulk(2, Duration::ZERO), CacheConfig::default(), Arc::new(fixtures::metadata()));
    script_all(&h);
    let (s, _b) = scheduler(&h);
    s.start(Duration::from_millis(10));
    assert_eq!(s.status().interval, Some(Duration::from_secs(1)));
    s.stop();
}

#[tokio::test]
async fn heartbeat_reports_batch_size() {
    let h = harness_with(bulk(2, Duration::ZERO), CacheConfig::default(), Arc::new(fixtures::metadata()));
    script_all(&h);
    let (s, b) = scheduler(&h);
    let mut sub = b.connect(Vec::new()).await;
    s.trigger().await.unwrap();
    assert!(matches!(sub.recv().await, Some(FeedEvent::InitialData { .. })));
    match sub.recv().await {
        Some(FeedEvent::Heartbeat {
            records,
            subscribers,
            ..
        }) => {
            assert_eq!(records, 5);
            assert_eq!(subscribers, 1);
        }
        other => panic!("expected heartbeat, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stop_during_slow_update_prevents_further_ticks() {
    let h = harness_with(bulk(5, Duration::ZERO), CacheConfig::default(), Arc::new(fixtures::metadata()));
    script_all(&h);
    for (i, addr) in ADDRESSES.iter().enumerate() {
        h.pairs.set(
            addr,
            tokenfeed_mock::MockBehavior::Delayed(
                Duration::from_secs(3),
                vec![fixtures::pair("0xpair", price_of(i), 1_000_000.0, 400_000.0)],
            ),
        );
    }
    let (s, _b) = scheduler(&h);

    s.start(Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(s.stop());

    tokio::time::sleep(Duration::from_secs(30)).await;
    let st = s.status();
    // The update in flight at stop time completes; nothing runs after it.
    assert_eq!(st.runs, 1);
    assert_eq!(st.failures, 0);
    assert_eq!(h.pairs.calls(), 5);
}
