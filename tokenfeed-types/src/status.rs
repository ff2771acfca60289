//! Point-in-time snapshots returned by status queries.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Source;

/// Remaining quota for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// Provider.
    pub provider: Source,
    /// Requests still available in the current window.
    pub remaining: u32,
    /// Configured requests per window.
    pub total: u32,
    /// Time until the current window resets (zero when no window is open).
    pub reset_in: Duration,
}

/// Occupancy of both cache tiers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Live in-process entries.
    pub memory_entries: usize,
    /// In-process capacity.
    pub memory_capacity: usize,
    /// Durable `token:*` keys.
    pub durable_token_entries: usize,
    /// Durable `aggregated:*` keys.
    pub durable_aggregated_entries: usize,
    /// Durable store memory usage as reported by the store.
    pub durable_memory_bytes: u64,
}

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// No timer installed.
    Stopped,
    /// Periodic timer active.
    Running,
}

/// Scheduler status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Current state.
    pub state: SchedulerState,
    /// Active cadence, when running.
    pub interval: Option<Duration>,
    /// Completed updates (scheduled and manual).
    pub runs: u64,
    /// Updates that failed.
    pub failures: u64,
    /// Completion time of the last successful update.
    pub last_run: Option<DateTime<Utc>>,
    /// Number of records produced by the last successful update.
    pub last_count: usize,
}
