//! Upstream provider identities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One external market-data provider.
///
/// The declaration order is the contribution order used in
/// [`CanonicalRecord::sources`](crate::CanonicalRecord::sources).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Provider A: per-pair DEX data (multiple pairs per token).
    DexScreener,
    /// Provider B: one token record plus its top pools.
    GeckoTerminal,
}

impl Source {
    /// Stable lowercase identifier used in logs, cache payloads and status reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DexScreener => "dexscreener",
            Self::GeckoTerminal => "geckoterminal",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
