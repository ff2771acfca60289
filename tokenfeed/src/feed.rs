use std::sync::Arc;

use tokenfeed_core::{
    CanonicalRecord, Clock, DurableStore, FeedConfig, FeedError, MetadataLookup, PairsUpstream,
    SystemClock, TokenUpstream,
};

use crate::broadcast::{Broadcaster, SubscriberId, Subscription};
use crate::core::{Aggregator, AggregatorBuilder};
use crate::scheduler::Scheduler;

/// Composition root: one aggregator, broadcaster and scheduler sharing a clock.
#[derive(Clone)]
pub struct Feed {
    aggregator: Aggregator,
    broadcaster: Broadcaster,
    scheduler: Scheduler,
    config: FeedConfig,
}

/// Builder for [`Feed`].
///
/// Without explicit upstreams, both HTTP connectors are built from the
/// configuration with their rate limits and retry policies.
pub struct FeedBuilder {
    config: FeedConfig,
    metadata: Option<Arc<dyn MetadataLookup>>,
    store: Option<Arc<dyn DurableStore>>,
    clock: Option<Arc<dyn Clock>>,
    pairs: Option<Arc<PairsUpstream>>,
    tokens: Option<Arc<TokenUpstream>>,
}

impl Default for FeedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedBuilder {
    /// Builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: FeedConfig::default(),
            metadata: None,
            store: None,
            clock: None,
            pairs: None,
            tokens: None,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: FeedConfig) -> Self {
        self.config = config;
        self
    }

    /// Token metadata lookup (required).
    #[must_use]
    pub fn metadata(mut self, metadata: Arc<dyn MetadataLookup>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Durable tier. Defaults to an in-process store.
    #[must_use]
    pub fn durable_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Clock shared by record and event timestamps.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use these upstreams instead of the HTTP connectors.
    #[must_use]
    pub fn upstreams(mut self, pairs: Arc<PairsUpstream>, tokens: Arc<TokenUpstream>) -> Self {
        self.pairs = Some(pairs);
        self.tokens = Some(tokens);
        self
    }

    /// Wire every component.
    ///
    /// # Errors
    /// Returns `FeedError::InvalidArg` when the metadata lookup is missing or a
    /// connector configuration is invalid.
    pub fn build(self) -> Result<Feed, FeedError> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let mut agg = AggregatorBuilder::new()
            .cache_config(self.config.cache)
            .bulk_config(self.config.bulk)
            .clock(Arc::clone(&clock));
        if let Some(metadata) = self.metadata {
            agg = agg.metadata(metadata);
        }
        if let Some(store) = self.store {
            agg = agg.durable_store(store);
        }
        agg = match (self.pairs, self.tokens) {
            (Some(pairs), Some(tokens)) => agg.pairs_upstream(pairs).token_upstream(tokens),
            _ => agg.http_upstreams(&self.config.dexscreener, &self.config.geckoterminal)?,
        };
        let aggregator = agg.build()?;
        let broadcaster = Broadcaster::new(self.config.broadcast, clock);
        let scheduler = Scheduler::new(
            aggregator.clone(),
            broadcaster.clone(),
            self.config.scheduler,
        );
        Ok(Feed {
            aggregator,
            broadcaster,
            scheduler,
            config: self.config,
        })
    }
}

impl Feed {
    /// Start building a feed.
    #[must_use]
    pub fn builder() -> FeedBuilder {
        FeedBuilder::new()
    }

    /// The orchestrator.
    #[must_use]
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// The broadcaster.
    #[must_use]
    pub const fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// The scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Start the scheduler at the configured interval.
    pub fn start(&self) -> bool {
        self.scheduler.start_default()
    }

    /// Stop the scheduler.
    pub fn stop(&self) -> bool {
        self.scheduler.stop()
    }

    /// Connect a subscriber. Its first event is `initial_data` with the current
    /// aggregated list (empty when bulk aggregation fails).
    pub async fn connect(&self) -> Subscription {
        let initial: Vec<CanonicalRecord> =
            self.aggregator.aggregate_all().await.unwrap_or_else(|err| {
                tracing::warn!(target: "tokenfeed", error = %err, "initial data unavailable for new subscriber");
                Vec::new()
            });
        self.broadcaster.connect(initial).await
    }

    /// Apply a raw subscriber command.
    pub async fn handle_message(&self, id: SubscriberId, raw: &str) {
        self.broadcaster.handle_message(id, raw).await;
    }

    /// Drop a subscriber.
    pub async fn disconnect(&self, id: SubscriberId) -> bool {
        self.broadcaster.disconnect(id).await
    }
}
