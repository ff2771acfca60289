//! Canonical market record and its building blocks.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{FeedError, Source};

/// Lowercase, trimmed form of an address used for lookups and cache keys.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Static token identity owned by the metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Contract address.
    pub address: String,
    /// Display name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
}

impl TokenMetadata {
    /// Convenience constructor.
    pub fn new(
        address: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            symbol: symbol.into(),
        }
    }
}

/// Rolling window for per-window metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    /// Last hour.
    #[serde(rename = "1h")]
    H1,
    /// Last six hours.
    #[serde(rename = "6h")]
    H6,
    /// Last 24 hours.
    #[serde(rename = "24h")]
    H24,
    /// Last seven days. Neither provider reports a 7d window; this reads the 24h data.
    #[serde(rename = "7d")]
    D7,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::H1 => "1h",
            Self::H6 => "6h",
            Self::H24 => "24h",
            Self::D7 => "7d",
        })
    }
}

impl FromStr for Window {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1h" | "h1" => Ok(Self::H1),
            "6h" | "h6" => Ok(Self::H6),
            "24h" | "h24" | "1d" => Ok(Self::H24),
            "7d" | "d7" => Ok(Self::D7),
            other => Err(FeedError::InvalidArg(format!("unknown window: {other}"))),
        }
    }
}

/// A numeric metric reported per window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowMetrics {
    /// Value over the last hour.
    pub h1: f64,
    /// Value over the last six hours.
    pub h6: f64,
    /// Value over the last 24 hours.
    pub h24: f64,
}

impl WindowMetrics {
    /// Read the value for a window; `D7` aliases `H24`.
    #[must_use]
    pub const fn get(&self, window: Window) -> f64 {
        match window {
            Window::H1 => self.h1,
            Window::H6 => self.h6,
            Window::H24 | Window::D7 => self.h24,
        }
    }
}

/// Buy and sell transaction counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnCounts {
    /// Number of buys.
    pub buys: u64,
    /// Number of sells.
    pub sells: u64,
}

/// Transaction counts per window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnWindows {
    /// Last hour.
    pub h1: TxnCounts,
    /// Last six hours.
    pub h6: TxnCounts,
    /// Last 24 hours.
    pub h24: TxnCounts,
}

impl TxnWindows {
    /// Read the counts for a window; `D7` aliases `H24`.
    #[must_use]
    pub const fn get(&self, window: Window) -> TxnCounts {
        match window {
            Window::H1 => self.h1,
            Window::H6 => self.h6,
            Window::H24 | Window::D7 => self.h24,
        }
    }
}

/// Market data portion of a canonical record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketFields {
    /// Price in USD.
    pub price_usd: f64,
    /// Price in the chain's native asset, when reported.
    pub price_native: Option<f64>,
    /// Percentage price change per window.
    pub price_change: WindowMetrics,
    /// Traded volume in USD per window.
    pub volume: WindowMetrics,
    /// Buy/sell counts per window.
    pub txns: TxnWindows,
    /// Fully diluted valuation in USD.
    pub fdv: f64,
    /// Market capitalisation in USD, when reported.
    pub market_cap: Option<f64>,
    /// Pool liquidity in USD.
    pub liquidity_usd: f64,
    /// Address of the pair/pool the windowed metrics come from.
    pub pair_address: String,
    /// DEX identifier of that pair.
    pub dex_id: String,
}

/// Merged, provider-agnostic market view for one token.
///
/// A record always names at least one contributing source: the only constructor
/// is [`CanonicalRecord::try_new`], and deserialization rejects an empty list, so
/// a corrupted cache entry reads back as a miss rather than an invalid record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    /// Token address (normalized).
    pub address: String,
    /// Token name from metadata.
    pub name: String,
    /// Token symbol from metadata.
    pub symbol: String,
    /// Market data.
    #[serde(flatten)]
    pub market: MarketFields,
    #[serde(deserialize_with = "non_empty_sources")]
    sources: Vec<Source>,
    /// When the record was assembled.
    pub last_updated: DateTime<Utc>,
}

impl CanonicalRecord {
    /// Assemble a record. Returns `None` when `sources` is empty.
    #[must_use]
    pub fn try_new(
        meta: &TokenMetadata,
        market: MarketFields,
        sources: Vec<Source>,
        last_updated: DateTime<Utc>,
    ) -> Option<Self> {
        if sources.is_empty() {
            return None;
        }
        Some(Self {
            address: normalize_address(&meta.address),
            name: meta.name.clone(),
            symbol: meta.symbol.clone(),
            market,
            sources,
            last_updated,
        })
    }

    /// Contributing providers in contribution order. Never empty.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Price change percentage for a window (`D7` reads the 24h value).
    #[must_use]
    pub const fn price_change_for(&self, window: Window) -> f64 {
        self.market.price_change.get(window)
    }

    /// Volume for a window (`D7` reads the 24h value).
    #[must_use]
    pub const fn volume_for(&self, window: Window) -> f64 {
        self.market.volume.get(window)
    }

    /// Transaction counts for a window (`D7` reads the 24h value).
    #[must_use]
    pub const fn txns_for(&self, window: Window) -> TxnCounts {
        self.market.txns.get(window)
    }
}

fn non_empty_sources<'de, D>(deserializer: D) -> Result<Vec<Source>, D::Error>
where
    D: Deserializer<'de>,
{
    let sources = Vec::<Source>::deserialize(deserializer)?;
    if sources.is_empty() {
        return Err(serde::de::Error::custom(
            "canonical record requires at least one source",
        ));
    }
    Ok(sources)
}
