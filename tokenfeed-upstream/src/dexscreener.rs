use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokenfeed_core::{FeedError, PairSnapshot, Source, Upstream, UpstreamConfig};
use tokenfeed_middleware::RateLimitedClient;

use crate::http::{HttpClient, RawTxns, RawWindows, lenient_f64};

/// Provider A connector: `GET {base}/latest/dex/tokens/{address}`.
pub struct DexScreener {
    http: HttpClient,
}

impl DexScreener {
    /// Build a raw connector.
    ///
    /// # Errors
    /// Returns `FeedError::InvalidArg` when the base URL or HTTP client configuration is invalid.
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, FeedError> {
        Ok(Self {
            http: HttpClient::new(Source::DexScreener, cfg)?,
        })
    }

    /// Build a connector wrapped with the configured request window and retry policy.
    ///
    /// # Errors
    /// Same as [`DexScreener::new`].
    pub fn rate_limited(cfg: &UpstreamConfig) -> Result<RateLimitedClient<Vec<PairSnapshot>>, FeedError> {
        let raw: Arc<dyn Upstream<Payload = Vec<PairSnapshot>>> = Arc::new(Self::new(cfg)?);
        Ok(crate::wrap(raw, Source::DexScreener, cfg))
    }
}

#[derive(Debug, Deserialize)]
struct TokenPairsResponse {
    #[serde(default)]
    pairs: Option<Vec<RawPair>>,
}

#[derive(Debug, Deserialize)]
struct RawLiquidity {
    #[serde(default, deserialize_with = "lenient_f64")]
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPair {
    #[serde(default)]
    pair_address: String,
    #[serde(default)]
    dex_id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_native: Option<f64>,
    #[serde(default)]
    price_change: RawWindows,
    #[serde(default)]
    volume: RawWindows,
    #[serde(default)]
    txns: Option<RawTxns>,
    #[serde(default)]
    liquidity: Option<RawLiquidity>,
    #[serde(default, deserialize_with = "lenient_f64")]
    fdv: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
}

impl From<RawPair> for PairSnapshot {
    fn from(p: RawPair) -> Self {
        Self {
            pair_address: p.pair_address,
            dex_id: p.dex_id,
            price_usd: p.price_usd,
            price_native: p.price_native,
            price_change: p.price_change.into(),
            volume: p.volume.into(),
            txns: p.txns.map(Into::into),
            liquidity_usd: p.liquidity.and_then(|l| l.usd),
            fdv: p.fdv,
            market_cap: p.market_cap,
        }
    }
}

#[async_trait]
impl Upstream for DexScreener {
    type Payload = Vec<PairSnapshot>;

    fn source(&self) -> Source {
        Source::DexScreener
    }

    async fn fetch(&self, address: &str) -> Result<Vec<PairSnapshot>, FeedError> {
        let url = self.http.endpoint(&["latest", "dex", "tokens", address]);
        let resp: TokenPairsResponse = self.http.get_json(url, "application/json").await?;
        let pairs: Vec<PairSnapshot> = resp
            .pairs
            .unwrap_or_default()
            .into_iter()
            .map(PairSnapshot::from)
            .collect();
        tracing::debug!(provider = "dexscreener", address, pairs = pairs.len(), "pairs fetched");
        Ok(pairs)
    }
}
