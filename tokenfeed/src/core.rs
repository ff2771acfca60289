use std::sync::Arc;

use futures::future::join_all;
use tokenfeed_core::{
    BulkConfig, CacheConfig, CacheStats, CanonicalRecord, Clock, DurableStore, FeedError,
    MetadataLookup, PairSnapshot, PairsUpstream, RateLimitStatus, SystemClock, TokenMetadata,
    TokenSnapshot, TokenUpstream, UpstreamConfig, merge, normalize_address,
};
use tokenfeed_middleware::{MemoryStore, RateLimitedClient, RateLimiter, TwoTierCache};
use tokenfeed_upstream::{DexScreener, GeckoTerminal};

/// Orchestrator that serves records from cache and aggregates both providers on a miss.
///
/// Cheap to clone; clones share the same cache, limiters and upstreams.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

struct Inner {
    pairs: Arc<PairsUpstream>,
    tokens: Arc<TokenUpstream>,
    limiters: Vec<Arc<RateLimiter>>,
    cache: Arc<TwoTierCache>,
    metadata: Arc<dyn MetadataLookup>,
    clock: Arc<dyn Clock>,
    bulk: BulkConfig,
}

/// Builder for constructing an [`Aggregator`].
pub struct AggregatorBuilder {
    pairs: Option<Arc<PairsUpstream>>,
    tokens: Option<Arc<TokenUpstream>>,
    limiters: Vec<Arc<RateLimiter>>,
    store: Option<Arc<dyn DurableStore>>,
    metadata: Option<Arc<dyn MetadataLookup>>,
    clock: Option<Arc<dyn Clock>>,
    cache: CacheConfig,
    bulk: BulkConfig,
}

impl Default for AggregatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatorBuilder {
    /// Empty builder: default cache and bulk settings, no collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pairs: None,
            tokens: None,
            limiters: Vec::new(),
            store: None,
            metadata: None,
            clock: None,
            cache: CacheConfig::default(),
            bulk: BulkConfig::default(),
        }
    }

    /// Provider A upstream, used as is.
    #[must_use]
    pub fn pairs_upstream(mut self, upstream: Arc<PairsUpstream>) -> Self {
        self.pairs = Some(upstream);
        self
    }

    /// Provider B upstream, used as is.
    #[must_use]
    pub fn token_upstream(mut self, upstream: Arc<TokenUpstream>) -> Self {
        self.tokens = Some(upstream);
        self
    }

    /// Provider A behind a rate-limited client; its limiter is reported by
    /// [`Aggregator::rate_limit_status`].
    #[must_use]
    pub fn rate_limited_pairs(mut self, client: RateLimitedClient<Vec<PairSnapshot>>) -> Self {
        self.limiters.push(Arc::clone(client.limiter()));
        self.pairs = Some(Arc::new(client));
        self
    }

    /// Provider B behind a rate-limited client.
    #[must_use]
    pub fn rate_limited_tokens(mut self, client: RateLimitedClient<TokenSnapshot>) -> Self {
        self.limiters.push(Arc::clone(client.limiter()));
        self.tokens = Some(Arc::new(client));
        self
    }

    /// Wire both HTTP connectors with their configured windows and retry policies.
    ///
    /// # Errors
    /// Returns `FeedError::InvalidArg` when either connector configuration is invalid.
    pub fn http_upstreams(
        self,
        dexscreener: &UpstreamConfig,
        geckoterminal: &UpstreamConfig,
    ) -> Result<Self, FeedError> {
        Ok(self
            .rate_limited_pairs(DexScreener::rate_limited(dexscreener)?)
            .rate_limited_tokens(GeckoTerminal::rate_limited(geckoterminal)?))
    }

    /// Durable tier. Defaults to an in-process [`MemoryStore`].
    #[must_use]
    pub fn durable_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Token metadata lookup (required).
    #[must_use]
    pub fn metadata(mut self, metadata: Arc<dyn MetadataLookup>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Clock used for `last_updated`. Defaults to the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Cache sizing and lifetimes.
    #[must_use]
    pub const fn cache_config(mut self, cfg: CacheConfig) -> Self {
        self.cache = cfg;
        self
    }

    /// Bulk chunking.
    #[must_use]
    pub const fn bulk_config(mut self, cfg: BulkConfig) -> Self {
        self.bulk = cfg;
        self
    }

    /// Build the aggregator.
    ///
    /// # Errors
    /// Returns `FeedError::InvalidArg` when an upstream or the metadata lookup is missing.
    pub fn build(self) -> Result<Aggregator, FeedError> {
        let pairs = self
            .pairs
            .ok_or_else(|| FeedError::InvalidArg("provider A upstream is required".into()))?;
        let tokens = self
            .tokens
            .ok_or_else(|| FeedError::InvalidArg("provider B upstream is required".into()))?;
        let metadata = self
            .metadata
            .ok_or_else(|| FeedError::InvalidArg("metadata lookup is required".into()))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::default()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let mut bulk = self.bulk;
        bulk.chunk_size = bulk.chunk_size.max(1);
        Ok(Aggregator {
            inner: Arc::new(Inner {
                pairs,
                tokens,
                limiters: self.limiters,
                cache: Arc::new(TwoTierCache::new(self.cache, store)),
                metadata,
                clock,
                bulk,
            }),
        })
    }
}

impl Aggregator {
    /// Start building an aggregator.
    #[must_use]
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::new()
    }

    /// The two-tier cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<TwoTierCache> {
        &self.inner.cache
    }

    /// The metadata lookup.
    #[must_use]
    pub fn metadata(&self) -> &Arc<dyn MetadataLookup> {
        &self.inner.metadata
    }

    /// The clock used for record timestamps.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    fn ensure_ready(&self) -> Result<(), FeedError> {
        if self.inner.metadata.is_ready() {
            Ok(())
        } else {
            Err(FeedError::Metadata("metadata lookup is not ready".into()))
        }
    }

    /// Serve one address from cache, aggregating both providers on a miss.
    ///
    /// The upstream round-trip runs on its own task: a caller that gives up
    /// early does not cancel it and the result is still cached.
    ///
    /// # Errors
    /// `MetadataNotFound` for an unknown address, `NoDataAvailable` when neither
    /// provider returned data, `Metadata` when the lookup is not ready.
    #[tracing::instrument(target = "tokenfeed", skip(self))]
    pub async fn aggregate(&self, address: &str) -> Result<CanonicalRecord, FeedError> {
        let address = normalize_address(address);
        if let Some(hit) = self.inner.cache.get(&address).await {
            return Ok(hit);
        }
        self.ensure_ready()?;
        let meta = self
            .inner
            .metadata
            .get(&address)
            .ok_or_else(|| FeedError::metadata_not_found(&address))?;
        self.spawn_fetch(meta).await
    }

    /// Drop the cached entries for one address, then aggregate it from upstream.
    ///
    /// # Errors
    /// Same as [`Aggregator::aggregate`].
    #[tracing::instrument(target = "tokenfeed", skip(self))]
    pub async fn refresh(&self, address: &str) -> Result<CanonicalRecord, FeedError> {
        let address = normalize_address(address);
        self.inner.cache.invalidate(&address).await;
        self.inner.cache.invalidate_aggregated().await;
        self.aggregate(&address).await
    }

    /// Serve every known token: the cached full list when present, otherwise
    /// per-address cache hits plus fresh aggregation of the misses.
    ///
    /// Misses are fetched in sequential chunks of `chunk_size` concurrent
    /// addresses. After each chunk the fresh records are already cached and
    /// the full list is rewritten with everything gathered so far; chunks are
    /// separated by `inter_chunk_delay`. Failed addresses are logged and skipped.
    /// If the list is invalidated while the run is in progress (a refresh), the
    /// run stops rewriting it and only returns its records to the caller.
    ///
    /// # Errors
    /// Only `Metadata` when the lookup is not ready.
    #[tracing::instrument(target = "tokenfeed", skip(self))]
    pub async fn aggregate_all(&self) -> Result<Vec<CanonicalRecord>, FeedError> {
        if let Some(list) = self.inner.cache.get_all().await {
            tracing::debug!(records = list.len(), "serving cached aggregated list");
            return Ok(list);
        }
        self.ensure_ready()?;
        // Progress writes are dropped once a refresh invalidates the list mid-run.
        let epoch = self.inner.cache.aggregated_epoch().await;

        let tokens = self.inner.metadata.list_all();
        let addresses: Vec<String> = tokens
            .iter()
            .map(|t| normalize_address(&t.address))
            .collect();
        let cached = self.inner.cache.get_many(&addresses).await;

        let mut records = Vec::with_capacity(tokens.len());
        let mut misses = Vec::new();
        for (meta, hit) in tokens.into_iter().zip(cached) {
            match hit {
                Some(record) => records.push(record),
                None => misses.push(meta),
            }
        }
        tracing::debug!(hits = records.len(), misses = misses.len(), "bulk cache lookup");

        if misses.is_empty() {
            self.inner.cache.set_all_if_current(&records, epoch).await;
            return Ok(records);
        }

        let chunks: Vec<&[TokenMetadata]> = misses.chunks(self.inner.bulk.chunk_size).collect();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let results = join_all(chunk.iter().cloned().map(|meta| {
                let address = meta.address.clone();
                let this = self.clone();
                async move { (address, this.spawn_fetch(meta).await) }
            }))
            .await;
            for (address, result) in results {
                match result {
                    Ok(record) => records.push(record),
                    Err(err) => {
                        tracing::warn!(address = %address, error = %err, "skipping address in bulk aggregation");
                    }
                }
            }
            self.inner.cache.set_all_if_current(&records, epoch).await;
            if i < last {
                tokio::time::sleep(self.inner.bulk.inter_chunk_delay).await;
            }
        }
        Ok(records)
    }

    /// Drop every cached record, then aggregate all known tokens from upstream.
    ///
    /// # Errors
    /// Same as [`Aggregator::aggregate_all`].
    #[tracing::instrument(target = "tokenfeed", skip(self))]
    pub async fn refresh_all(&self) -> Result<Vec<CanonicalRecord>, FeedError> {
        let removed = self.inner.cache.clear().await;
        tracing::debug!(removed, "cache cleared before bulk refresh");
        self.aggregate_all().await
    }

    /// Occupancy of both cache tiers.
    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats().await
    }

    /// Remove every cached record from both tiers; returns the number of durable keys removed.
    pub async fn clear_cache(&self) -> usize {
        let removed = self.inner.cache.clear().await;
        tracing::info!(target: "tokenfeed", removed, "cache cleared");
        removed
    }

    /// Remaining request quota per rate-limited provider.
    #[must_use]
    pub fn rate_limit_status(&self) -> Vec<RateLimitStatus> {
        self.inner.limiters.iter().map(|l| l.status()).collect()
    }

    async fn spawn_fetch(&self, meta: TokenMetadata) -> Result<CanonicalRecord, FeedError> {
        let address = normalize_address(&meta.address);
        let inner = Arc::clone(&self.inner);
        match tokio::spawn(async move { inner.fetch_and_store(meta).await }).await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::error!(address = %address, error = %join_err, "aggregation task failed");
                Err(FeedError::no_data(address))
            }
        }
    }
}

impl Inner {
    async fn fetch_and_store(&self, meta: TokenMetadata) -> Result<CanonicalRecord, FeedError> {
        let address = normalize_address(&meta.address);
        let (pairs, token) = tokio::join!(self.pairs.fetch(&address), self.tokens.fetch(&address));

        let pairs = pairs.unwrap_or_else(|err| {
            tracing::warn!(provider = %self.pairs.source(), address = %address, error = %err, "provider contributed no data");
            Vec::new()
        });
        let token = match token {
            Ok(token) => Some(token),
            Err(err) if err.is_upstream_not_found() => {
                tracing::debug!(provider = %self.tokens.source(), address = %address, "token unknown to provider");
                None
            }
            Err(err) => {
                tracing::warn!(provider = %self.tokens.source(), address = %address, error = %err, "provider contributed no data");
                None
            }
        };

        let record = merge(&pairs, token.as_ref(), &meta, self.clock.now())
            .ok_or_else(|| FeedError::no_data(&address))?;
        self.cache.set(&record).await;
        tracing::debug!(address = %address, sources = ?record.sources(), "aggregated");
        Ok(record)
    }
}
