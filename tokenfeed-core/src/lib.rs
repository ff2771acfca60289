//! tokenfeed-core
//!
//! Contracts and pure algorithms shared across the tokenfeed workspace.
//!
//! - `upstream`: the `Upstream` trait and the normalized provider payloads.
//! - `merge`: the merge engine turning provider payloads into one `CanonicalRecord`.
//! - `store`: the durable key-value store contract and key layout.
//! - `metadata`: the static token metadata lookup.
//! - `clock`: injectable wall clock for record timestamps.
#![warn(missing_docs)]

/// Injectable wall clock.
pub mod clock;
/// Merge engine.
pub mod merge;
/// Token metadata lookup contract and static implementation.
pub mod metadata;
/// Durable cache store contract.
pub mod store;
/// Upstream provider contract and payloads.
pub mod upstream;

pub use clock::{Clock, FixedClock, SystemClock};
pub use merge::{Contributions, SourceQuote, merge, select_primary_pair};
pub use metadata::{MetadataLookup, StaticMetadata};
pub use store::{DurableStore, keys};
pub use upstream::{
    PairSnapshot, PairsUpstream, PoolSnapshot, TokenSnapshot, TokenUpstream, Upstream,
    WindowValues,
};

pub use tokenfeed_types::*;
