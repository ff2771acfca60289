use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tokenfeed_types::{FeedError, Source, TxnWindows};

/// One upstream market-data provider.
///
/// Implemented by the raw HTTP connectors and by the middleware wrappers around
/// them, so a rate-limited, retrying client is itself an `Upstream`.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Provider-specific payload returned for one address.
    type Payload: Send + 'static;

    /// Provider identity.
    fn source(&self) -> Source;

    /// Fetch the provider payload for a token address.
    async fn fetch(&self, address: &str) -> Result<Self::Payload, FeedError>;
}

/// Provider A: zero or more pairs per token.
pub type PairsUpstream = dyn Upstream<Payload = Vec<PairSnapshot>>;

/// Provider B: one token record plus its top pools.
pub type TokenUpstream = dyn Upstream<Payload = TokenSnapshot>;

/// Optional per-window values as reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowValues {
    /// Last hour.
    pub h1: Option<f64>,
    /// Last six hours.
    pub h6: Option<f64>,
    /// Last 24 hours.
    pub h24: Option<f64>,
}

/// Normalized Provider A pair record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairSnapshot {
    /// Pair contract address.
    pub pair_address: String,
    /// DEX identifier.
    pub dex_id: String,
    /// Price in USD.
    pub price_usd: Option<f64>,
    /// Price in the chain's native asset.
    pub price_native: Option<f64>,
    /// Percentage price change per window.
    pub price_change: WindowValues,
    /// Volume in USD per window.
    pub volume: WindowValues,
    /// Buy/sell counts per window.
    pub txns: Option<TxnWindows>,
    /// Pair liquidity in USD.
    pub liquidity_usd: Option<f64>,
    /// Fully diluted valuation.
    pub fdv: Option<f64>,
    /// Market capitalisation.
    pub market_cap: Option<f64>,
}

/// Normalized Provider B pool record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Pool contract address.
    pub address: String,
    /// DEX identifier.
    pub dex_id: String,
    /// Base token price in USD.
    pub price_usd: Option<f64>,
    /// Percentage price change per window.
    pub price_change: WindowValues,
    /// Volume in USD per window.
    pub volume: WindowValues,
    /// Buy/sell counts per window.
    pub txns: Option<TxnWindows>,
    /// Pool reserve in USD.
    pub reserve_usd: Option<f64>,
}

/// Normalized Provider B token record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    /// Price in USD.
    pub price_usd: Option<f64>,
    /// Fully diluted valuation.
    pub fdv: Option<f64>,
    /// Market capitalisation.
    pub market_cap: Option<f64>,
    /// Sum of reserves across the token's pools.
    pub total_reserve_usd: Option<f64>,
    /// Token-level 24h volume.
    pub volume_24h: Option<f64>,
    /// Top pools, most relevant first.
    pub pools: Vec<PoolSnapshot>,
}
