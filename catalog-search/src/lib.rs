//! # catalog-search
//!
//! Multi-source product catalog search with ranking, deduplication and
//! result caching.
//!
//! Upstream callers (a chat bot, a web handler) ask for products matching a
//! term. This crate fans the request out to every registered catalog source,
//! normalizes whatever each source returns into a canonical
//! [`ProductRecord`], scores each record, removes near-duplicates and caches
//! the final list.
//!
//! ## Design
//!
//! - Sources implement [`SourceAdapter`]; the crate ships two built-in ones
//!   in [`sources`] and never talks to the network itself
//! - Sources are queried concurrently (or one at a time) in priority order,
//!   each under its own timeout
//! - One failing or slow source never fails the search
//! - Source health (success rate, response time, circuit state) is tracked
//!   per source and exposed through [`CatalogSearch::get_stats`]
//! - Ranked lists are cached in memory with a TTL, and concurrent identical
//!   searches share one fetch
//!
//! ## Privacy
//!
//! - Search terms are logged only at trace level

pub mod cache;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod source;
pub mod sources;
pub mod types;

pub use catalog::{CatalogSearch, CatalogSearchBuilder, CatalogStats};
pub use config::{CatalogConfig, SourceSettings};
pub use error::{FetchError, Result, SearchError};
pub use orchestrator::fetch::ConcurrencyMode;
pub use registry::SourceStats;
pub use source::{FieldMap, SourceAdapter};
pub use types::{ProductRecord, RawListing};

/// Load a configuration file and build an engine over `adapters`.
///
/// Convenience wrapper around [`CatalogConfig::from_file`] and
/// [`CatalogSearch::builder`].
///
/// # Errors
///
/// Returns [`SearchError::Io`] if the file cannot be read and
/// [`SearchError::Config`] if it is malformed or the adapters are invalid.
///
/// # Examples
///
/// ```no_run
/// # fn example() -> catalog_search::Result<()> {
/// use std::sync::Arc;
/// use catalog_search::sources::ManualFallbackSource;
/// use catalog_search::SourceAdapter;
///
/// let manual: Arc<dyn SourceAdapter> =
///     Arc::new(ManualFallbackSource::new("https://shop.example.com/contact"));
/// let catalog = catalog_search::from_config_file(std::path::Path::new("catalog.toml"), vec![manual])?;
/// println!("{} sources", catalog.get_stats().total_sources);
/// # Ok(())
/// # }
/// ```
pub fn from_config_file(
    path: &std::path::Path,
    adapters: Vec<std::sync::Arc<dyn SourceAdapter>>,
) -> Result<CatalogSearch> {
    let config = CatalogConfig::from_file(path)?;
    adapters
        .into_iter()
        .fold(CatalogSearch::builder(config), CatalogSearchBuilder::shared_source)
        .build()
}
