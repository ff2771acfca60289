use chrono::{DateTime, Utc};

use crate::upstream::{PairSnapshot, TokenSnapshot, WindowValues};
use tokenfeed_types::{CanonicalRecord, MarketFields, Source, TokenMetadata, TxnWindows};

/// Provider payload normalized to a common shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceQuote {
    /// Price in USD.
    pub price_usd: Option<f64>,
    /// Price in the chain's native asset.
    pub price_native: Option<f64>,
    /// Percentage price change per window.
    pub price_change: WindowValues,
    /// Volume per window.
    pub volume: WindowValues,
    /// Buy/sell counts per window.
    pub txns: Option<TxnWindows>,
    /// Fully diluted valuation.
    pub fdv: Option<f64>,
    /// Market capitalisation.
    pub market_cap: Option<f64>,
    /// Liquidity in USD.
    pub liquidity_usd: Option<f64>,
    /// Pair or pool address.
    pub pair_address: Option<String>,
    /// DEX identifier.
    pub dex_id: Option<String>,
}

impl SourceQuote {
    /// Normalize a Provider A pair.
    #[must_use]
    pub fn from_pair(pair: &PairSnapshot) -> Self {
        Self {
            price_usd: finite(pair.price_usd),
            price_native: finite(pair.price_native),
            price_change: finite_windows(pair.price_change),
            volume: finite_windows(pair.volume),
            txns: pair.txns,
            fdv: finite(pair.fdv),
            market_cap: finite(pair.market_cap),
            liquidity_usd: finite(pair.liquidity_usd),
            pair_address: non_empty(&pair.pair_address),
            dex_id: non_empty(&pair.dex_id),
        }
    }

    /// Normalize a Provider B token record.
    ///
    /// Windowed metrics come from the top pool; liquidity prefers the token-wide
    /// reserve and falls back to the top pool reserve.
    #[must_use]
    pub fn from_token(token: &TokenSnapshot) -> Self {
        let top = token.pools.first();
        let mut volume = top.map(|p| finite_windows(p.volume)).unwrap_or_default();
        if let Some(v) = finite(token.volume_24h) {
            volume.h24 = Some(v);
        }
        Self {
            price_usd: finite(token.price_usd).or_else(|| top.and_then(|p| finite(p.price_usd))),
            price_native: None,
            price_change: top.map(|p| finite_windows(p.price_change)).unwrap_or_default(),
            volume,
            txns: top.and_then(|p| p.txns),
            fdv: finite(token.fdv),
            market_cap: finite(token.market_cap),
            liquidity_usd: finite(token.total_reserve_usd)
                .or_else(|| top.and_then(|p| finite(p.reserve_usd))),
            pair_address: top.and_then(|p| non_empty(&p.address)),
            dex_id: top.and_then(|p| non_empty(&p.dex_id)),
        }
    }

    fn into_market(self) -> MarketFields {
        MarketFields {
            price_usd: self.price_usd.unwrap_or(0.0),
            price_native: self.price_native,
            price_change: self.price_change.into(),
            volume: self.volume.into(),
            txns: self.txns.unwrap_or_default(),
            fdv: self.fdv.unwrap_or(0.0),
            market_cap: self.market_cap,
            liquidity_usd: self.liquidity_usd.unwrap_or(0.0),
            pair_address: self.pair_address.unwrap_or_default(),
            dex_id: self.dex_id.unwrap_or_default(),
        }
    }
}

impl From<WindowValues> for tokenfeed_types::WindowMetrics {
    fn from(w: WindowValues) -> Self {
        Self {
            h1: w.h1.unwrap_or(0.0),
            h6: w.h6.unwrap_or(0.0),
            h24: w.h24.unwrap_or(0.0),
        }
    }
}

/// Which providers contributed for one address.
#[derive(Debug, Clone, PartialEq)]
pub enum Contributions {
    /// No provider returned data.
    NoData,
    /// Exactly one provider returned data.
    SingleSource(Source, SourceQuote),
    /// Both providers returned data; Provider A first.
    DualSource(SourceQuote, SourceQuote),
}

impl Contributions {
    /// Classify raw provider payloads.
    ///
    /// Provider A contributes when it returned at least one pair (the one with the
    /// highest 24h volume is used); Provider B contributes when it returned a token.
    #[must_use]
    pub fn from_payloads(pairs: &[PairSnapshot], token: Option<&TokenSnapshot>) -> Self {
        let a = select_primary_pair(pairs).map(SourceQuote::from_pair);
        let b = token.map(SourceQuote::from_token);
        match (a, b) {
            (None, None) => Self::NoData,
            (Some(a), None) => Self::SingleSource(Source::DexScreener, a),
            (None, Some(b)) => Self::SingleSource(Source::GeckoTerminal, b),
            (Some(a), Some(b)) => Self::DualSource(a, b),
        }
    }

    /// Contributing providers in contribution order.
    #[must_use]
    pub fn sources(&self) -> Vec<Source> {
        match self {
            Self::NoData => Vec::new(),
            Self::SingleSource(source, _) => vec![*source],
            Self::DualSource(..) => vec![Source::DexScreener, Source::GeckoTerminal],
        }
    }

    /// Combine into a record. `NoData` yields `None`.
    #[must_use]
    pub fn into_record(
        self,
        meta: &TokenMetadata,
        observed_at: DateTime<Utc>,
    ) -> Option<CanonicalRecord> {
        let sources = self.sources();
        let market = match self {
            Self::NoData => return None,
            Self::SingleSource(_, quote) => quote.into_market(),
            Self::DualSource(a, b) => combine(a, b).into_market(),
        };
        CanonicalRecord::try_new(meta, market, sources, observed_at)
    }
}

/// Merge provider payloads into one canonical record.
///
/// - Provider A may return several pairs; the one with the highest 24h volume wins
///   (ties keep the first seen).
/// - With both providers present, price, price change, volume, FDV and market cap are
///   the arithmetic mean of the values both report; liquidity takes Provider B's value
///   when present; native price, transaction counts, pair address and DEX id take
///   Provider A's value when present.
/// - With one provider, its values pass through unchanged.
/// - With none, no record is produced.
#[must_use]
pub fn merge(
    pairs: &[PairSnapshot],
    token: Option<&TokenSnapshot>,
    meta: &TokenMetadata,
    observed_at: DateTime<Utc>,
) -> Option<CanonicalRecord> {
    Contributions::from_payloads(pairs, token).into_record(meta, observed_at)
}

/// Pair with the highest 24h volume; the first one wins on ties.
#[must_use]
pub fn select_primary_pair(pairs: &[PairSnapshot]) -> Option<&PairSnapshot> {
    let mut best: Option<(&PairSnapshot, f64)> = None;
    for pair in pairs {
        let vol = finite(pair.volume.h24).unwrap_or(0.0);
        match best {
            Some((_, best_vol)) if vol <= best_vol => {}
            _ => best = Some((pair, vol)),
        }
    }
    best.map(|(p, _)| p)
}

fn combine(a: SourceQuote, b: SourceQuote) -> SourceQuote {
    SourceQuote {
        price_usd: mean(a.price_usd, b.price_usd),
        price_native: a.price_native.or(b.price_native),
        price_change: mean_windows(a.price_change, b.price_change),
        volume: mean_windows(a.volume, b.volume),
        txns: a.txns.or(b.txns),
        fdv: mean(a.fdv, b.fdv),
        market_cap: mean(a.market_cap, b.market_cap),
        liquidity_usd: b.liquidity_usd.or(a.liquidity_usd),
        pair_address: a.pair_address.or(b.pair_address),
        dex_id: a.dex_id.or(b.dex_id),
    }
}

fn mean(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        (a, b) => a.or(b),
    }
}

fn mean_windows(a: WindowValues, b: WindowValues) -> WindowValues {
    WindowValues {
        h1: mean(a.h1, b.h1),
        h6: mean(a.h6, b.h6),
        h24: mean(a.h24, b.h24),
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

fn finite_windows(w: WindowValues) -> WindowValues {
    WindowValues {
        h1: finite(w.h1),
        h6: finite(w.h6),
        h24: finite(w.h24),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pair(addr: &str, vol24: Option<f64>) -> PairSnapshot {
        PairSnapshot {
            pair_address: addr.into(),
            dex_id: "uniswap".into(),
            price_usd: Some(1.0),
            volume: WindowValues {
                h24: vol24,
                ..WindowValues::default()
            },
            ..PairSnapshot::default()
        }
    }

    #[test]
    fn primary_pair_prefers_highest_volume_then_first_seen() {
        let pairs = vec![
            pair("a", Some(10.0)),
            pair("b", Some(30.0)),
            pair("c", Some(30.0)),
            pair("d", None),
        ];
        assert_eq!(select_primary_pair(&pairs).unwrap().pair_address, "b");
        assert!(select_primary_pair(&[]).is_none());
    }

    #[test]
    fn no_contributors_builds_nothing() {
        let meta = TokenMetadata::new("0x1", "One", "ONE");
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(Contributions::from_payloads(&[], None), Contributions::NoData);
        assert!(merge(&[], None, &meta, ts).is_none());
    }

    #[test]
    fn mean_only_averages_present_values() {
        assert_eq!(mean(Some(1.0), Some(3.0)), Some(2.0));
        assert_eq!(mean(None, Some(3.0)), Some(3.0));
        assert_eq!(mean(Some(1.0), None), Some(1.0));
        assert_eq!(mean(None, None), None);
    }
}
