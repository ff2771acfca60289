//! Mock upstreams for CI-safe tests.
//!
//! [`MockUpstream`] answers per address from a script: queued one-shot behaviors
//! are consumed first, then the address's standing behavior, then the fallback.
//! Every call is counted so tests can assert how often a provider was hit.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokenfeed_core::{
    FeedError, PairSnapshot, Source, TokenSnapshot, Upstream, normalize_address,
};

pub mod fixtures;

/// How one call should behave.
#[derive(Clone)]
pub enum MockBehavior<T> {
    /// Return the value immediately.
    Return(T),
    /// Return the value after a delay.
    Delayed(Duration, T),
    /// Fail immediately.
    Fail(FeedError),
    /// Never complete.
    Hang,
}

struct Script<T> {
    queued: HashMap<String, VecDeque<MockBehavior<T>>>,
    standing: HashMap<String, MockBehavior<T>>,
    fallback: MockBehavior<T>,
    calls_by_address: HashMap<String, usize>,
}

/// Scriptable upstream. Clones share the same script and counters.
pub struct MockUpstream<T> {
    source: Source,
    script: Arc<Mutex<Script<T>>>,
    calls: Arc<AtomicUsize>,
}

impl<T> Clone for MockUpstream<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            script: Arc::clone(&self.script),
            calls: Arc::clone(&self.calls),
        }
    }
}

/// Provider A mock.
pub type MockPairs = MockUpstream<Vec<PairSnapshot>>;
/// Provider B mock.
pub type MockTokens = MockUpstream<TokenSnapshot>;

impl MockPairs {
    /// Provider A mock that answers unknown addresses with an empty pair list.
    #[must_use]
    pub fn dexscreener() -> Self {
        Self::new(Source::DexScreener, MockBehavior::Return(Vec::new()))
    }
}

impl MockTokens {
    /// Provider B mock that answers unknown addresses with 404.
    #[must_use]
    pub fn geckoterminal() -> Self {
        Self::new(
            Source::GeckoTerminal,
            MockBehavior::Fail(FeedError::client(
                Source::GeckoTerminal.as_str(),
                404,
                "token not found",
            )),
        )
    }
}

impl<T: Clone> MockUpstream<T> {
    /// Mock for `source` using `fallback` for unscripted addresses.
    #[must_use]
    pub fn new(source: Source, fallback: MockBehavior<T>) -> Self {
        Self {
            source,
            script: Arc::new(Mutex::new(Script {
                queued: HashMap::new(),
                standing: HashMap::new(),
                fallback,
                calls_by_address: HashMap::new(),
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script<T>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Standing behavior for an address.
    pub fn set(&self, address: &str, behavior: MockBehavior<T>) {
        self.script()
            .standing
            .insert(normalize_address(address), behavior);
    }

    /// Shorthand for a standing `Return`.
    pub fn respond(&self, address: &str, value: T) {
        self.set(address, MockBehavior::Return(value));
    }

    /// Queue a one-shot behavior consumed before the standing one.
    pub fn push(&self, address: &str, behavior: MockBehavior<T>) {
        self.script()
            .queued
            .entry(normalize_address(address))
            .or_default()
            .push_back(behavior);
    }

    /// Total calls across all addresses.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls for one address.
    #[must_use]
    pub fn calls_for(&self, address: &str) -> usize {
        self.script()
            .calls_by_address
            .get(&normalize_address(address))
            .copied()
            .unwrap_or(0)
    }

    fn next_behavior(&self, address: &str) -> MockBehavior<T> {
        let key = normalize_address(address);
        let mut script = self.script();
        *script.calls_by_address.entry(key.clone()).or_default() += 1;
        if let Some(b) = script.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return b;
        }
        script
            .standing
            .get(&key)
            .cloned()
            .unwrap_or_else(|| script.fallback.clone())
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Upstream for MockUpstream<T> {
    type Payload = T;

    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, address: &str) -> Result<T, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_behavior(address) {
            MockBehavior::Return(v) => Ok(v),
            MockBehavior::Delayed(d, v) => {
                tokio::time::sleep(d).await;
                Ok(v)
            }
            MockBehavior::Fail(e) => Err(e),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}
