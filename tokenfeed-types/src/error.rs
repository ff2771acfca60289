use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the tokenfeed workspace.
///
/// Provider-level failures (`ClientError`, `RateLimited`, `Transient`, `Exhausted`,
/// `Decode`) are absorbed by the orchestrator and never escalate past "this address
/// could not be aggregated now". `MetadataNotFound` and `NoDataAvailable` are the two
/// outcomes surfaced to callers as not-found.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeedError {
    /// Non-retryable 4xx response (anything except 429).
    #[error("{provider} rejected request with status {status}: {message}")]
    ClientError {
        /// Provider identifier.
        provider: String,
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body excerpt or reason phrase.
        message: String,
    },

    /// The provider answered 429.
    #[error("{provider} rate limited the request (retry_after_ms={retry_after_ms:?})")]
    RateLimited {
        /// Provider identifier.
        provider: String,
        /// Server-supplied `Retry-After`, if any.
        retry_after_ms: Option<u64>,
    },

    /// Network error or 5xx response.
    #[error("{provider} transient failure: {message}")]
    Transient {
        /// Provider identifier.
        provider: String,
        /// Human-readable error message.
        message: String,
    },

    /// Retries were spent; carries the last observed error.
    #[error("{provider} failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Provider identifier.
        provider: String,
        /// Number of attempts made.
        attempts: u32,
        /// Final error before giving up.
        last: Box<FeedError>,
    },

    /// The provider answered 2xx with a body that could not be decoded.
    #[error("{provider} returned an undecodable payload: {message}")]
    Decode {
        /// Provider identifier.
        provider: String,
        /// Decoder message.
        message: String,
    },

    /// The address is not part of the known token set.
    #[error("unknown token address: {address}")]
    MetadataNotFound {
        /// Requested address.
        address: String,
    },

    /// No provider contributed data for the address.
    #[error("no provider returned data for {address}")]
    NoDataAvailable {
        /// Requested address.
        address: String,
    },

    /// The durable cache store failed an operation.
    #[error("cache store error: {0}")]
    Store(String),

    /// The metadata lookup is not ready or failed.
    #[error("metadata lookup unavailable: {0}")]
    Metadata(String),

    /// Invalid input argument or configuration.
    #[error("invalid argument: {0}")]
    InvalidArg(String),
}

impl FeedError {
    /// Helper: build a `ClientError`.
    pub fn client(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::ClientError {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Helper: build a `RateLimited` error.
    pub fn rate_limited(provider: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            retry_after_ms,
        }
    }

    /// Helper: build a `Transient` error.
    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Helper: build a `Decode` error.
    pub fn decode(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Helper: build a `MetadataNotFound` error.
    pub fn metadata_not_found(address: impl Into<String>) -> Self {
        Self::MetadataNotFound {
            address: address.into(),
        }
    }

    /// Helper: build a `NoDataAvailable` error.
    pub fn no_data(address: impl Into<String>) -> Self {
        Self::NoDataAvailable {
            address: address.into(),
        }
    }

    /// Returns true when the retry policy should try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient { .. })
    }

    /// Returns true for the outcomes surfaced to callers as not-found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MetadataNotFound { .. } | Self::NoDataAvailable { .. }
        )
    }

    /// Returns true when the provider reported the token as unknown (404).
    #[must_use]
    pub const fn is_upstream_not_found(&self) -> bool {
        matches!(self, Self::ClientError { status: 404, .. })
    }

    /// Server-supplied retry hint carried by a `RateLimited` error.
    #[must_use]
    pub const fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::RateLimited {
                retry_after_ms: Some(ms),
                ..
            } => Some(std::time::Duration::from_millis(*ms)),
            _ => None,
        }
    }
}
