//! Deterministic provider payloads and token metadata.

use tokenfeed_core::{
    PairSnapshot, PoolSnapshot, StaticMetadata, TokenMetadata, TokenSnapshot, TxnCounts,
    TxnWindows, WindowValues,
};

/// Token addresses known to [`metadata`], lowercase.
pub const ADDRESSES: [&str; 5] = [
    "0x1111111111111111111111111111111111111111",
    "0x2222222222222222222222222222222222222222",
    "0x3333333333333333333333333333333333333333",
    "0x4444444444444444444444444444444444444444",
    "0x5555555555555555555555555555555555555555",
];

/// Metadata table for [`ADDRESSES`].
#[must_use]
pub fn metadata() -> StaticMetadata {
    let names = [
        ("Alpha", "ALP"),
        ("Bravo", "BRV"),
        ("Charlie", "CHL"),
        ("Delta", "DLT"),
        ("Echo", "ECH"),
    ];
    StaticMetadata::new(
        ADDRESSES
            .iter()
            .zip(names)
            .map(|(addr, (name, symbol))| TokenMetadata::new(*addr, name, symbol)),
    )
}

/// All three windows set to the same value.
#[must_use]
pub const fn flat(v: f64) -> WindowValues {
    WindowValues {
        h1: Some(v),
        h6: Some(v),
        h24: Some(v),
    }
}

/// Provider A pair with the given price, 24h volume and liquidity.
#[must_use]
pub fn pair(pair_address: &str, price: f64, volume_24h: f64, liquidity: f64) -> PairSnapshot {
    PairSnapshot {
        pair_address: pair_address.to_string(),
        dex_id: "uniswap".to_string(),
        price_usd: Some(price),
        price_native: Some(price / 2_000.0),
        price_change: WindowValues {
            h1: Some(0.5),
            h6: Some(1.5),
            h24: Some(3.0),
        },
        volume: WindowValues {
            h1: Some(volume_24h / 24.0),
            h6: Some(volume_24h / 4.0),
            h24: Some(volume_24h),
        },
        txns: Some(TxnWindows {
            h1: TxnCounts { buys: 10, sells: 8 },
            h6: TxnCounts { buys: 60, sells: 45 },
            h24: TxnCounts {
                buys: 240,
                sells: 200,
            },
        }),
        liquidity_usd: Some(liquidity),
        fdv: Some(price * 1_000_000_000.0),
        market_cap: Some(price * 800_000_000.0),
    }
}

/// Provider B token with one top pool.
#[must_use]
pub fn token(price: f64, volume_24h: f64, total_reserve: f64) -> TokenSnapshot {
    TokenSnapshot {
        price_usd: Some(price),
        fdv: Some(price * 1_000_000_000.0),
        market_cap: Some(price * 800_000_000.0),
        total_reserve_usd: Some(total_reserve),
        volume_24h: Some(volume_24h),
        pools: vec![PoolSnapshot {
            address: "0xpool".to_string(),
            dex_id: "uniswap_v3".to_string(),
            price_usd: Some(price),
            price_change: WindowValues {
                h1: Some(0.7),
                h6: Some(1.1),
                h24: Some(2.0),
            },
            volume: flat(volume_24h),
            txns: None,
            reserve_usd: Some(total_reserve),
        }],
    }
}
