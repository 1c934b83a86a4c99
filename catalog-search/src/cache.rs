//! In-memory cache of final ranked result lists.
//!
//! Caches the deduplicated, scored, truncated list keyed by the
//! (normalised term, limit, explicit source subset) triple. Built on
//! [`moka`]: entries expire after the configured TTL, the number of entries
//! is bounded, and concurrent misses for the same key share a single fetch
//! cycle instead of each fanning out to every source.

use std::future::Future;
use std::time::Duration;

use moka::future::Cache;

use crate::types::ProductRecord;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased, trimmed search term.
    term: String,
    /// Requested result count.
    limit: usize,
    /// Sorted explicit source subset, `None` for the default source set.
    sources: Option<Vec<String>>,
}

impl CacheKey {
    /// Build a deterministic key.
    ///
    /// The term is trimmed and lowercased; an explicit source subset is
    /// sorted and deduplicated so `[a, b]` and `[b, a]` share an entry.
    pub fn new(term: &str, limit: usize, sources: Option<&[String]>) -> Self {
        let sources = sources.map(|names| {
            let mut sorted = names.to_vec();
            sorted.sort();
            sorted.dedup();
            sorted
        });
        Self {
            term: term.trim().to_lowercase(),
            limit,
            sources,
        }
    }
}

/// TTL-bounded, size-bounded store of ranked result lists.
///
/// A TTL of zero disables caching: every lookup misses and nothing is stored.
#[derive(Clone)]
pub struct ResultCache {
    inner: Option<Cache<CacheKey, Vec<ProductRecord>>>,
}

impl ResultCache {
    /// Create a cache holding at most `max_entries` lists for `ttl_seconds`.
    pub fn new(ttl_seconds: u64, max_entries: u64) -> Self {
        let inner = (ttl_seconds > 0).then(|| {
            Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build()
        });
        Self { inner }
    }

    /// Returns `true` unless caching was disabled with a zero TTL.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Look up a fresh entry.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<ProductRecord>> {
        match &self.inner {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    /// Store `records` under `key`, replacing any previous list.
    pub async fn insert(&self, key: CacheKey, records: Vec<ProductRecord>) {
        if let Some(cache) = &self.inner {
            cache.insert(key, records).await;
        }
    }

    /// Return the cached list for `key`, running `fetch` on a miss.
    ///
    /// Concurrent callers missing on the same key wait for one shared `fetch`
    /// instead of each running their own. The fetched list replaces any stale
    /// entry wholesale.
    pub async fn get_or_fetch<F>(&self, key: CacheKey, fetch: F) -> Vec<ProductRecord>
    where
        F: Future<Output = Vec<ProductRecord>>,
    {
        let Some(cache) = &self.inner else {
            return fetch.await;
        };

        let entry = cache.entry(key).or_insert_with(fetch).await;
        if entry.is_fresh() {
            tracing::debug!(count = entry.value().len(), "cached fresh results");
        } else {
            tracing::debug!(count = entry.value().len(), "cache hit");
        }
        entry.into_value()
    }

    /// Approximate number of live entries.
    ///
    /// moka counts entries lazily: recent inserts and expirations are only
    /// reflected once its pending maintenance has run.
    pub fn entry_count(&self) -> u64 {
        self.inner.as_ref().map_or(0, |cache| cache.entry_count())
    }

    /// Drop every cached list.
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.is_enabled())
            .field("entries", &self.entry_count())
            .finish()
    }
}
