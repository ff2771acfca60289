//! Subscriber-facing events and inbound commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CanonicalRecord;

/// A price change for one address between consecutive aggregation cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    /// Token address.
    pub address: String,
    /// Token symbol.
    pub symbol: String,
    /// New USD price.
    pub price: f64,
    /// Previously broadcast USD price.
    pub previous_price: f64,
    /// Percentage change versus the previous price.
    pub price_change: f64,
    /// Record timestamp.
    pub timestamp: DateTime<Utc>,
}

/// A 24h volume jump for one address between consecutive aggregation cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpike {
    /// Token address.
    pub address: String,
    /// Token symbol.
    pub symbol: String,
    /// New 24h volume.
    #[serde(rename = "volume24h")]
    pub volume_24h: f64,
    /// Previously broadcast 24h volume.
    #[serde(rename = "previousVolume24h")]
    pub previous_volume_24h: f64,
    /// Percentage increase versus the previous volume.
    pub percentage_increase: f64,
    /// Record timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Outbound event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// Full aggregated list, sent once to a fresh connection.
    InitialData {
        /// Current records.
        data: Vec<CanonicalRecord>,
    },
    /// Price change for a subscribed address.
    PriceUpdate(PriceUpdate),
    /// All price changes of one batch.
    PriceUpdates {
        /// Changes in batch order.
        updates: Vec<PriceUpdate>,
        /// Batch time.
        timestamp: DateTime<Utc>,
    },
    /// Volume spike for a subscribed address.
    VolumeSpike(VolumeSpike),
    /// All volume spikes of one batch.
    VolumeSpikes {
        /// Spikes in batch order.
        spikes: Vec<VolumeSpike>,
        /// Batch time.
        timestamp: DateTime<Utc>,
    },
    /// Liveness signal sent after every batch.
    Heartbeat {
        /// Records in the batch.
        records: usize,
        /// Connected subscribers.
        subscribers: usize,
        /// Batch time.
        timestamp: DateTime<Utc>,
    },
    /// Command error addressed to one subscriber.
    Error {
        /// Human-readable message.
        message: String,
    },
}

impl FeedEvent {
    /// Wire name of the event, matching the serialized `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InitialData { .. } => "initial_data",
            Self::PriceUpdate(_) => "price_update",
            Self::PriceUpdates { .. } => "price_updates",
            Self::VolumeSpike(_) => "volume_spike",
            Self::VolumeSpikes { .. } => "volume_spikes",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Error { .. } => "error",
        }
    }
}

/// Inbound subscriber command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Opt into deltas for these addresses.
    Subscribe {
        /// Token addresses.
        addresses: Vec<String>,
    },
    /// Opt out of deltas for these addresses.
    Unsubscribe {
        /// Token addresses.
        addresses: Vec<String>,
    },
}
