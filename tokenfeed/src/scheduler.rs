use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokenfeed_core::{FeedError, SchedulerConfig, SchedulerState, SchedulerStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::broadcast::Broadcaster;
use crate::core::Aggregator;

/// Periodic bulk aggregation feeding the broadcaster.
///
/// Each tick (and each manual [`Scheduler::trigger`]) runs a cache-aware
/// [`Aggregator::aggregate_all`] and hands the batch to the [`Broadcaster`]. A
/// failed tick is logged and counted; the timer keeps running.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    aggregator: Aggregator,
    broadcaster: Broadcaster,
    config: SchedulerConfig,
    run: Mutex<RunState>,
    stats: Mutex<Stats>,
}

enum RunState {
    Stopped,
    Running {
        interval: Duration,
        stop_tx: watch::Sender<bool>,
        task: JoinHandle<()>,
    },
}

#[derive(Default)]
struct Stats {
    runs: u64,
    failures: u64,
    last_run: Option<chrono::DateTime<chrono::Utc>>,
    last_count: usize,
}

impl Scheduler {
    /// Create a stopped scheduler.
    #[must_use]
    pub fn new(aggregator: Aggregator, broadcaster: Broadcaster, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                aggregator,
                broadcaster,
                config,
                run: Mutex::new(RunState::Stopped),
                stats: Mutex::new(Stats::default()),
            }),
        }
    }

    /// Start ticking every `interval` (raised to the configured minimum).
    ///
    /// Sets the durable tier's default TTL to the fault-tolerance value and
    /// runs the first update immediately. Returns false if already running.
    pub fn start(&self, interval: Duration) -> bool {
        let mut run = self.inner.run.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*run, RunState::Running { .. }) {
            tracing::debug!(target: "tokenfeed", "scheduler already running");
            return false;
        }
        let interval = interval.max(self.inner.config.min_interval);
        self.inner
            .aggregator
            .cache()
            .set_durable_ttl(self.inner.config.fault_tolerant_ttl);

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        // A stop that raced the tick wins.
                        if *stop_rx.borrow() {
                            break;
                        }
                        let _ = inner.run_update().await;
                    }
                }
            }
        });
        tracing::info!(target: "tokenfeed", interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX), "scheduler started");
        *run = RunState::Running {
            interval,
            stop_tx,
            task,
        };
        true
    }

    /// Start with the configured interval.
    pub fn start_default(&self) -> bool {
        self.start(self.inner.config.interval)
    }

    /// Stop ticking. Idempotent; returns false if already stopped.
    ///
    /// An update already in progress runs to completion; no further update
    /// starts after this returns.
    pub fn stop(&self) -> bool {
        let mut run = self.inner.run.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *run, RunState::Stopped) {
            RunState::Stopped => false,
            RunState::Running { stop_tx, task, .. } => {
                let _ = stop_tx.send(true);
                drop(task);
                tracing::info!(target: "tokenfeed", "scheduler stopped");
                true
            }
        }
    }

    /// Run one update now without touching the schedule.
    ///
    /// # Errors
    /// Propagates the bulk aggregation error; it is also counted as a failure.
    pub async fn trigger(&self) -> Result<usize, FeedError> {
        self.inner.run_update().await
    }

    /// Current state and counters.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        let (state, interval) = match &*self.inner.run.lock().unwrap_or_else(PoisonError::into_inner) {
            RunState::Stopped => (SchedulerState::Stopped, None),
            RunState::Running { interval, .. } => (SchedulerState::Running, Some(*interval)),
        };
        let stats = self.inner.stats.lock().unwrap_or_else(PoisonError::into_inner);
        SchedulerStatus {
            state,
            interval,
            runs: stats.runs,
            failures: stats.failures,
            last_run: stats.last_run,
            last_count: stats.last_count,
        }
    }
}

impl Inner {
    async fn run_update(&self) -> Result<usize, FeedError> {
        match self.aggregator.aggregate_all().await {
            Ok(records) => {
                let summary = self.broadcaster.broadcast(&records).await;
                let count = records.len();
                let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
                stats.runs += 1;
                stats.last_run = Some(self.aggregator.clock().now());
                stats.last_count = count;
                tracing::debug!(
                    target: "tokenfeed",
                    records = count,
                    price_updates = summary.price_updates,
                    volume_spikes = summary.volume_spikes,
                    "scheduled update complete"
                );
                Ok(count)
            }
            Err(err) => {
                self.stats
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .failures += 1;
                tracing::error!(target: "tokenfeed", error = %err, "scheduled update failed");
                Err(err)
            }
        }
    }
}
