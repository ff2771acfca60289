use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tokenfeed_core::{FeedError, Source, UpstreamConfig};
use url::Url;

const USER_AGENT: &str = concat!("tokenfeed/", env!("CARGO_PKG_VERSION"));

/// Shared GET-and-decode plumbing for one provider.
pub(crate) struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
    source: Source,
}

impl HttpClient {
    pub(crate) fn new(source: Source, cfg: &UpstreamConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedError::InvalidArg(format!("http client: {e}")))?;
        let base_url = Url::parse(cfg.base_url.trim_end_matches('/'))
            .map_err(|e| FeedError::InvalidArg(format!("base url {:?}: {e}", cfg.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(FeedError::InvalidArg(format!(
                "base url {:?} cannot carry a path",
                cfg.base_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            source,
        })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        accept: &str,
    ) -> Result<T, FeedError> {
        let provider = self.source.as_str();
        tracing::debug!(provider, %url, "upstream request");
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| FeedError::transient(provider, format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after_ms(resp.headers(), Utc::now());
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(self.source, status, retry_after, &body));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FeedError::transient(provider, format!("reading body: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| FeedError::decode(provider, e.to_string()))
    }
}

/// Map a non-success status to the retry taxonomy.
///
/// 429 is rate limiting, other 4xx are permanent client errors, and everything
/// else (5xx, unexpected 1xx/3xx) is transient.
pub(crate) fn classify_status(
    source: Source,
    status: StatusCode,
    retry_after_ms: Option<u64>,
    body: &str,
) -> FeedError {
    let provider = source.as_str();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return FeedError::rate_limited(provider, retry_after_ms);
    }
    let excerpt: String = body.chars().take(200).collect();
    if status.is_client_error() {
        FeedError::client(provider, status.as_u16(), excerpt)
    } else {
        FeedError::transient(provider, format!("status {}: {excerpt}", status.as_u16()))
    }
}

/// `Retry-After` as milliseconds: delta-seconds or an HTTP date relative to `now`.
pub(crate) fn retry_after_ms(headers: &HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(secs.saturating_mul(1_000));
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delta = (at - now).to_std().unwrap_or(Duration::ZERO);
    Some(u64::try_from(delta.as_millis()).unwrap_or(u64::MAX))
}

/// Providers send numerics as JSON numbers, numeric strings or null.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Str(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    }
    .filter(|v| v.is_finite()))
}

/// Per-window numerics as both providers report them; other windows are ignored.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawWindows {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h6: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h24: Option<f64>,
}

impl From<RawWindows> for tokenfeed_core::WindowValues {
    fn from(w: RawWindows) -> Self {
        Self {
            h1: w.h1,
            h6: w.h6,
            h24: w.h24,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawCounts {
    #[serde(default)]
    pub buys: u64,
    #[serde(default)]
    pub sells: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTxns {
    #[serde(default)]
    pub h1: RawCounts,
    #[serde(default)]
    pub h6: RawCounts,
    #[serde(default)]
    pub h24: RawCounts,
}

impl From<RawTxns> for tokenfeed_core::TxnWindows {
    fn from(t: RawTxns) -> Self {
        let c = |r: RawCounts| tokenfeed_core::TxnCounts {
            buys: r.buys,
            sells: r.sells,
        };
        Self {
            h1: c(t.h1),
            h6: c(t.h6),
            h24: c(t.h24),
        }
    }
}
