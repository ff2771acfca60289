//! Delta broadcaster.
//!
//! Keeps the last record seen per address and, for each new batch, pushes
//! per-address price updates and volume spikes to that address's subscribers,
//! followed by batch-level summaries and a heartbeat to everyone.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokenfeed_core::{
    BroadcastConfig, CanonicalRecord, ClientCommand, Clock, FeedEvent, PriceUpdate, VolumeSpike,
    normalize_address,
};
use tokio::sync::{Mutex, mpsc};
use tokio::sync::mpsc::error::TrySendError;

/// Identifier of one connected subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving half handed to a connected subscriber.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<FeedEvent>,
}

impl Subscription {
    /// This subscriber's id, used for subscribe/unsubscribe commands.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event; `None` once the broadcaster dropped this subscriber.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<FeedEvent> {
        self.rx.try_recv().ok()
    }
}

/// Counts of deltas emitted for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    /// Price updates detected.
    pub price_updates: usize,
    /// Volume spikes detected.
    pub volume_spikes: usize,
    /// Subscribers connected after the batch.
    pub subscribers: usize,
}

struct Subscriber {
    tx: mpsc::Sender<FeedEvent>,
    addresses: HashSet<String>,
}

#[derive(Default)]
struct State {
    last_seen: HashMap<String, CanonicalRecord>,
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl State {
    // Returns false when the subscriber is gone and should be removed.
    fn deliver(id: SubscriberId, sub: &Subscriber, event: &FeedEvent) -> bool {
        match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(subscriber = %id, event = event.kind(), "subscriber lagging; event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn send_to_watchers(&self, address: &str, event: &FeedEvent, gone: &mut HashSet<SubscriberId>) {
        for (id, sub) in &self.subscribers {
            if sub.addresses.contains(address) && !Self::deliver(*id, sub, event) {
                gone.insert(*id);
            }
        }
    }

    fn send_to_all(&self, event: &FeedEvent, gone: &mut HashSet<SubscriberId>) {
        for (id, sub) in &self.subscribers {
            if !Self::deliver(*id, sub, event) {
                gone.insert(*id);
            }
        }
    }

    fn remove(&mut self, gone: HashSet<SubscriberId>) {
        for id in gone {
            if self.subscribers.remove(&id).is_some() {
                tracing::debug!(subscriber = %id, "subscriber disconnected");
            }
        }
    }
}

/// Fans aggregated batches out to subscribers as deltas.
///
/// Cheap to clone; clones share subscribers and last-seen state.
#[derive(Clone)]
pub struct Broadcaster {
    state: Arc<Mutex<State>>,
    next_id: Arc<AtomicU64>,
    config: BroadcastConfig,
    clock: Arc<dyn Clock>,
}

fn pct_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}

impl Broadcaster {
    /// Create a broadcaster. A zero subscriber buffer is raised to one.
    #[must_use]
    pub fn new(mut config: BroadcastConfig, clock: Arc<dyn Clock>) -> Self {
        config.subscriber_buffer = config.subscriber_buffer.max(1);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            config,
            clock,
        }
    }

    /// Register a subscriber and queue `initial` as its first event.
    ///
    /// The initial list is queued while holding the subscriber table, so no
    /// delta can reach the new subscriber ahead of it.
    pub async fn connect(&self, initial: Vec<CanonicalRecord>) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        let mut state = self.state.lock().await;
        // The channel is empty, so the first send cannot be rejected as full.
        let _ = tx.try_send(FeedEvent::InitialData { data: initial });
        state.subscribers.insert(
            id,
            Subscriber {
                tx,
                addresses: HashSet::new(),
            },
        );
        tracing::debug!(subscriber = %id, "subscriber connected");
        Subscription { id, rx }
    }

    /// Remove a subscriber.
    pub async fn disconnect(&self, id: SubscriberId) -> bool {
        let removed = self.state.lock().await.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, "subscriber disconnected");
        }
        removed
    }

    /// Opt a subscriber into per-address events. Returns false for an unknown subscriber.
    pub async fn subscribe(&self, id: SubscriberId, addresses: &[String]) -> bool {
        let mut state = self.state.lock().await;
        let Some(sub) = state.subscribers.get_mut(&id) else {
            return false;
        };
        sub.addresses
            .extend(addresses.iter().map(|a| normalize_address(a)));
        true
    }

    /// Opt a subscriber out of per-address events. Returns false for an unknown subscriber.
    pub async fn unsubscribe(&self, id: SubscriberId, addresses: &[String]) -> bool {
        let mut state = self.state.lock().await;
        let Some(sub) = state.subscribers.get_mut(&id) else {
            return false;
        };
        for address in addresses {
            sub.addresses.remove(&normalize_address(address));
        }
        true
    }

    /// Apply a JSON command from a subscriber. Malformed input is answered with
    /// an `error` event to that subscriber only.
    pub async fn handle_message(&self, id: SubscriberId, raw: &str) {
        match serde_json::from_str::<ClientCommand>(raw) {
            Ok(ClientCommand::Subscribe { addresses }) => {
                self.subscribe(id, &addresses).await;
            }
            Ok(ClientCommand::Unsubscribe { addresses }) => {
                self.unsubscribe(id, &addresses).await;
            }
            Err(err) => {
                tracing::debug!(subscriber = %id, error = %err, "rejected subscriber command");
                let event = FeedEvent::Error {
                    message: format!("invalid command: {err}"),
                };
                let mut state = self.state.lock().await;
                let alive = state
                    .subscribers
                    .get(&id)
                    .is_some_and(|sub| State::deliver(id, sub, &event));
                if !alive {
                    state.remove(HashSet::from([id]));
                }
            }
        }
    }

    /// Diff a batch against the last seen records and emit events.
    pub async fn broadcast(&self, records: &[CanonicalRecord]) -> BroadcastSummary {
        let timestamp = self.clock.now();
        let mut state = self.state.lock().await;
        let mut gone = HashSet::new();
        let mut updates = Vec::new();
        let mut spikes = Vec::new();

        for record in records {
            let current_price = record.market.price_usd;
            let current_volume = record.market.volume.h24;
            if let Some(prev) = state.last_seen.get(&record.address) {
                let previous_price = prev.market.price_usd;
                if current_price != previous_price {
                    let update = PriceUpdate {
                        address: record.address.clone(),
                        symbol: record.symbol.clone(),
                        price: current_price,
                        previous_price,
                        price_change: pct_change(previous_price, current_price),
                        timestamp,
                    };
                    state.send_to_watchers(
                        &record.address,
                        &FeedEvent::PriceUpdate(update.clone()),
                        &mut gone,
                    );
                    updates.push(update);
                }

                let previous_volume = prev.market.volume.h24;
                if previous_volume > 0.0
                    && current_volume / previous_volume >= self.config.volume_spike_ratio
                {
                    let spike = VolumeSpike {
                        address: record.address.clone(),
                        symbol: record.symbol.clone(),
                        volume_24h: current_volume,
                        previous_volume_24h: previous_volume,
                        percentage_increase: pct_change(previous_volume, current_volume),
                        timestamp,
                    };
                    state.send_to_watchers(
                        &record.address,
                        &FeedEvent::VolumeSpike(spike.clone()),
                        &mut gone,
                    );
                    spikes.push(spike);
                }
            }
            state
                .last_seen
                .insert(record.address.clone(), record.clone());
        }

        let summary_updates = updates.len();
        let summary_spikes = spikes.len();
        if !updates.is_empty() {
            state.send_to_all(&FeedEvent::PriceUpdates { updates, timestamp }, &mut gone);
        }
        if !spikes.is_empty() {
            state.send_to_all(&FeedEvent::VolumeSpikes { spikes, timestamp }, &mut gone);
        }
        let heartbeat = FeedEvent::Heartbeat {
            records: records.len(),
            subscribers: state.subscribers.len(),
            timestamp,
        };
        state.send_to_all(&heartbeat, &mut gone);
        state.remove(gone);

        tracing::debug!(
            records = records.len(),
            price_updates = summary_updates,
            volume_spikes = summary_spikes,
            "batch broadcast"
        );
        BroadcastSummary {
            price_updates: summary_updates,
            volume_spikes: summary_spikes,
            subscribers: state.subscribers.len(),
        }
    }

    /// Number of connected subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }

    /// Addresses with a last seen record.
    pub async fn tracked_addresses(&self) -> Vec<String> {
        let mut addrs: Vec<String> = self.state.lock().await.last_seen.keys().cloned().collect();
        addrs.sort();
        addrs
    }

    /// Last record seen for an address.
    pub async fn last_seen(&self, address: &str) -> Option<CanonicalRecord> {
        self.state
            .lock()
            .await
            .last_seen
            .get(&normalize_address(address))
            .cloned()
    }
}
