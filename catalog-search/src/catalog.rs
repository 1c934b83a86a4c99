//! The catalog search engine: registry, orchestrator and cache wired together.
//!
//! [`CatalogSearch`] is the single entry point upstream callers use. One
//! instance owns the registered adapters and the shared mutable state
//! (source health and cached results) and can be shared across tasks.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, ResultCache};
use crate::config::CatalogConfig;
use crate::error::{Result, SearchError};
use crate::orchestrator::fetch::{Orchestrator, SourceRequest};
use crate::orchestrator::normalize::normalize_batch;
use crate::orchestrator::rank_records;
use crate::orchestrator::scoring::filter_by_confidence;
use crate::registry::{SourceRegistry, SourceStats};
use crate::source::SourceAdapter;
use crate::types::ProductRecord;

/// Engine-wide health and cache snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Registered sources.
    pub total_sources: usize,
    /// Sources currently enabled.
    pub enabled_sources: usize,
    /// Number of cached result lists. The count is updated lazily, so an
    /// insert may not show up until the cache runs its pending maintenance.
    pub cache_entries: u64,
    /// Per-source stats keyed by source name.
    pub sources: BTreeMap<String, SourceStats>,
}

/// Builder for [`CatalogSearch`].
pub struct CatalogSearchBuilder {
    config: CatalogConfig,
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl CatalogSearchBuilder {
    /// Register an adapter.
    pub fn source(self, adapter: impl SourceAdapter + 'static) -> Self {
        self.shared_source(Arc::new(adapter))
    }

    /// Register an adapter that is already shared.
    pub fn shared_source(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Validate the configuration and build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration is invalid, no
    /// source was registered, or two adapters share a name.
    pub fn build(self) -> Result<CatalogSearch> {
        self.config.validate()?;

        if self.adapters.is_empty() {
            return Err(SearchError::Config(
                "at least one source must be registered".into(),
            ));
        }

        let mut adapters: HashMap<String, Arc<dyn SourceAdapter>> = HashMap::new();
        for adapter in self.adapters {
            let name = adapter.name().to_owned();
            if name.trim().is_empty() {
                return Err(SearchError::Config("source name must not be empty".into()));
            }
            if adapters.insert(name.clone(), adapter).is_some() {
                return Err(SearchError::Config(format!(
                    "source registered twice: {name}"
                )));
            }
        }

        let registry = SourceRegistry::new(&self.config, adapters.keys().map(String::as_str));
        let orchestrator = Orchestrator::from_config(&self.config);
        let cache = ResultCache::new(self.config.cache_ttl_seconds, self.config.cache_max_entries);

        tracing::debug!(
            sources = adapters.len(),
            mode = ?orchestrator.mode(),
            cache = cache.is_enabled(),
            "catalog search initialised"
        );

        Ok(CatalogSearch {
            config: self.config,
            adapters,
            registry: RwLock::new(registry),
            orchestrator,
            cache,
        })
    }
}

/// Multi-source product search with ranking, dedup and caching.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> catalog_search::Result<()> {
/// use catalog_search::sources::ManualFallbackSource;
/// use catalog_search::{CatalogConfig, CatalogSearch};
///
/// let catalog = CatalogSearch::builder(CatalogConfig::default())
///     .source(ManualFallbackSource::new("https://shop.example.com/contact"))
///     .build()?;
///
/// for product in catalog.search("phone case", 10, None).await? {
///     println!("{:.2} {} ({})", product.confidence_score, product.title, product.source_name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct CatalogSearch {
    config: CatalogConfig,
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
    registry: RwLock<SourceRegistry>,
    orchestrator: Orchestrator,
    cache: ResultCache,
}

impl CatalogSearch {
    /// Start building an engine with `config`.
    pub fn builder(config: CatalogConfig) -> CatalogSearchBuilder {
        CatalogSearchBuilder {
            config,
            adapters: Vec::new(),
        }
    }

    /// Search every enabled source, or only `sources` when given.
    ///
    /// # Pipeline
    ///
    /// 1. Validate the arguments (before any source is touched)
    /// 2. Return the cached list if one is still fresh
    /// 3. Fan out to the sources in priority order, each under its timeout
    /// 4. Fold every outcome into the source health stats
    /// 5. Normalize, score, sort, deduplicate, truncate to `limit`
    /// 6. Cache and return the list
    ///
    /// Source failures never surface here: a search where every source fails
    /// returns an empty list, and [`Self::get_stats`] shows which sources are
    /// unhealthy.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidArgument`] for an empty term, a zero
    /// limit, an empty subset, or an unknown source name.
    pub async fn search(
        &self,
        term: &str,
        limit: usize,
        sources: Option<&[String]>,
    ) -> Result<Vec<ProductRecord>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(SearchError::InvalidArgument(
                "search term must not be empty".into(),
            ));
        }
        if limit == 0 {
            return Err(SearchError::InvalidArgument(
                "limit must be greater than 0".into(),
            ));
        }

        let names = match sources {
            Some([]) => {
                return Err(SearchError::InvalidArgument(
                    "source subset must not be empty".into(),
                ))
            }
            Some(subset) => self.read_registry().ordered_sources(subset)?,
            None => self.read_registry().ordered_enabled_sources(),
        };

        tracing::trace!(term, limit, "catalog search");

        let key = CacheKey::new(term, limit, sources);
        let records = self
            .cache
            .get_or_fetch(key, self.fetch_cycle(term, limit, names))
            .await;

        tracing::debug!(count = records.len(), limit, "catalog search completed");
        Ok(records)
    }

    /// One uncached fan-out → rank cycle.
    async fn fetch_cycle(&self, term: &str, limit: usize, names: Vec<String>) -> Vec<ProductRecord> {
        let requests: Vec<SourceRequest> = {
            let mut registry = self.write_registry();
            let admitted = registry.admit(names);
            admitted
                .iter()
                .filter_map(|name| {
                    let adapter = self.adapters.get(name)?;
                    let source = registry.get(name)?;
                    Some(SourceRequest {
                        adapter: Arc::clone(adapter),
                        limit: source.max_products,
                    })
                })
                .collect()
        };

        let outcomes = self.orchestrator.run(&requests, term).await;

        {
            let mut registry = self.write_registry();
            for outcome in &outcomes {
                registry.record_outcome(&outcome.source, outcome.result.is_ok(), outcome.elapsed);
            }
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if failed > 0 && failed == outcomes.len() {
            tracing::warn!(failed, "every queried source failed");
        }

        let mut records = Vec::new();
        for (request, outcome) in requests.iter().zip(outcomes) {
            if let Ok(listings) = outcome.result {
                records.extend(normalize_batch(
                    &outcome.source,
                    listings,
                    &request.adapter.field_map(),
                ));
            }
        }

        rank_records(term, records, &self.config.trusted_sources, limit)
    }

    /// Health and config of every source plus cache size.
    pub fn get_stats(&self) -> CatalogStats {
        let registry = self.read_registry();
        CatalogStats {
            total_sources: registry.len(),
            enabled_sources: registry.enabled_count(),
            cache_entries: self.cache.entry_count(),
            sources: registry.snapshot(),
        }
    }

    /// Enable or disable a source for default searches.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidArgument`] for an unknown source.
    pub fn enable_source(&self, name: &str, enabled: bool) -> Result<()> {
        self.write_registry().enable_source(name, enabled)
    }

    /// Set a source's priority (lower = queried and ranked first).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidArgument`] for an unknown source.
    pub fn set_priority(&self, name: &str, priority: i32) -> Result<()> {
        self.write_registry().set_priority(name, priority)
    }

    /// Enabled sources in the order a default search visits them.
    pub fn ordered_enabled_sources(&self) -> Vec<String> {
        self.read_registry().ordered_enabled_sources()
    }

    /// Apply the configured `min_confidence_score` to a result list.
    pub fn filter_confident(&self, records: Vec<ProductRecord>) -> Vec<ProductRecord> {
        filter_by_confidence(records, self.config.min_confidence_score)
    }

    /// Drop every cached result list.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, SourceRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, SourceRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CatalogSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.adapters.keys().collect();
        names.sort();
        f.debug_struct("CatalogSearch")
            .field("sources", &names)
            .field("orchestrator", &self.orchestrator)
            .field("cache", &self.cache)
            .finish()
    }
}
