use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokenfeed_core::{FeedError, PoolSnapshot, Source, TokenSnapshot, Upstream, UpstreamConfig};
use tokenfeed_middleware::RateLimitedClient;

use crate::http::{HttpClient, RawTxns, RawWindows, lenient_f64};

const ACCEPT_JSON_API: &str = "application/json;version=20230302";

/// Provider B connector: `GET {base}/networks/{network}/tokens/{address}?include=top_pools`.
///
/// The response is a JSON:API document; top pools arrive in `included` and are
/// ordered by the token's `top_pools` relationship.
pub struct GeckoTerminal {
    http: HttpClient,
    network: String,
}

impl GeckoTerminal {
    /// Build a raw connector for `cfg.network`.
    ///
    /// # Errors
    /// Returns `FeedError::InvalidArg` when the network is empty or the base URL is invalid.
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, FeedError> {
        if cfg.network.trim().is_empty() {
            return Err(FeedError::InvalidArg("geckoterminal network must be set".into()));
        }
        Ok(Self {
            http: HttpClient::new(Source::GeckoTerminal, cfg)?,
            network: cfg.network.trim().to_string(),
        })
    }

    /// Build a connector wrapped with the configured request window and retry policy.
    ///
    /// # Errors
    /// Same as [`GeckoTerminal::new`].
    pub fn rate_limited(cfg: &UpstreamConfig) -> Result<RateLimitedClient<TokenSnapshot>, FeedError> {
        let raw: Arc<dyn Upstream<Payload = TokenSnapshot>> = Arc::new(Self::new(cfg)?);
        Ok(crate::wrap(raw, Source::GeckoTerminal, cfg))
    }
}

#[derive(Debug, Deserialize)]
struct TokenDocument {
    data: TokenResource,
    #[serde(default)]
    included: Vec<IncludedResource>,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ToMany {
    #[serde(default)]
    data: Vec<ResourceId>,
}

#[derive(Debug, Default, Deserialize)]
struct ToOne {
    #[serde(default)]
    data: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
struct TokenResource {
    attributes: TokenAttributes,
    #[serde(default)]
    relationships: TokenRelationships,
}

#[derive(Debug, Default, Deserialize)]
struct TokenRelationships {
    #[serde(default)]
    top_pools: ToMany,
}

#[derive(Debug, Deserialize)]
struct TokenAttributes {
    #[serde(default, deserialize_with = "lenient_f64")]
    price_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    fdv_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_reserve_in_usd: Option<f64>,
    #[serde(default)]
    volume_usd: RawWindows,
}

#[derive(Debug, Deserialize)]
struct IncludedResource {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Option<PoolAttributes>,
    #[serde(default)]
    relationships: PoolRelationships,
}

#[derive(Debug, Default, Deserialize)]
struct PoolRelationships {
    #[serde(default)]
    dex: ToOne,
}

#[derive(Debug, Deserialize)]
struct PoolAttributes {
    #[serde(default)]
    address: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    base_token_price_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    reserve_in_usd: Option<f64>,
    #[serde(default)]
    price_change_percentage: RawWindows,
    #[serde(default)]
    volume_usd: RawWindows,
    #[serde(default)]
    transactions: Option<RawTxns>,
}

impl IncludedResource {
    fn into_pool(self) -> Option<PoolSnapshot> {
        let attrs = self.attributes?;
        Some(PoolSnapshot {
            address: attrs.address,
            dex_id: self
                .relationships
                .dex
                .data
                .map(|d| d.id)
                .unwrap_or_default(),
            price_usd: attrs.base_token_price_usd,
            price_change: attrs.price_change_percentage.into(),
            volume: attrs.volume_usd.into(),
            txns: attrs.transactions.map(Into::into),
            reserve_usd: attrs.reserve_in_usd,
        })
    }
}

impl From<TokenDocument> for TokenSnapshot {
    fn from(doc: TokenDocument) -> Self {
        let mut by_id: HashMap<String, IncludedResource> = doc
            .included
            .into_iter()
            .filter(|r| r.kind == "pool")
            .map(|r| (r.id.clone(), r))
            .collect();
        let mut pools: Vec<PoolSnapshot> = doc
            .data
            .relationships
            .top_pools
            .data
            .iter()
            .filter_map(|rel| by_id.remove(&rel.id))
            .filter_map(IncludedResource::into_pool)
            .collect();
        // Pools missing from the relationship list go last, in a stable order.
        let mut rest: Vec<IncludedResource> = by_id.into_values().collect();
        rest.sort_by(|a, b| a.id.cmp(&b.id));
        pools.extend(rest.into_iter().filter_map(IncludedResource::into_pool));

        let attrs = doc.data.attributes;
        Self {
            price_usd: attrs.price_usd,
            fdv: attrs.fdv_usd,
            market_cap: attrs.market_cap_usd,
            total_reserve_usd: attrs.total_reserve_in_usd,
            volume_24h: attrs.volume_usd.h24,
            pools,
        }
    }
}

#[async_trait]
impl Upstream for GeckoTerminal {
    type Payload = TokenSnapshot;

    fn source(&self) -> Source {
        Source::GeckoTerminal
    }

    async fn fetch(&self, address: &str) -> Result<TokenSnapshot, FeedError> {
        let mut url = self
            .http
            .endpoint(&["networks", self.network.as_str(), "tokens", address]);
        url.query_pairs_mut().append_pair("include", "top_pools");
        let doc: TokenDocument = self.http.get_json(url, ACCEPT_JSON_API).await?;
        let token = TokenSnapshot::from(doc);
        tracing::debug!(
            provider = "geckoterminal",
            address,
            pools = token.pools.len(),
            "token fetched"
        );
        Ok(token)
    }
}
