//! Catalog search configuration with sensible defaults.
//!
//! [`CatalogConfig`] is loaded once at startup, either constructed in code or
//! read from a TOML or JSON file. Unknown keys are ignored and missing keys
//! fall back to the defaults documented on each field.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::{Result, SearchError};

/// Priority assigned to a source that has no `sources` entry.
pub const DEFAULT_SOURCE_PRIORITY: i32 = 100;

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Cap on listings requested from (and kept for) each source, unless the
    /// source has its own `max_products`.
    pub max_products_per_source: usize,
    /// Advisory threshold for callers; see
    /// [`filter_by_confidence`](crate::orchestrator::scoring::filter_by_confidence).
    /// `search` itself never drops records by score.
    pub min_confidence_score: f64,
    /// Query sources concurrently (`true`) or one at a time in priority order.
    pub parallel_scraping: bool,
    /// Reserved for adapters that retry internally. The engine never retries.
    pub retry_attempts: u32,
    /// Per-source timeout in seconds. Fractions are allowed.
    pub timeout_per_source: f64,
    /// How long a ranked result list stays cached. `0` disables caching.
    pub cache_ttl_seconds: u64,
    /// Upper bound on the number of cached result lists.
    pub cache_max_entries: u64,
    /// Sources whose records receive the trusted-source bonus.
    pub trusted_sources: Vec<String>,
    /// Random delay range in milliseconds `(min, max)` slept between sources
    /// in sequential mode.
    pub request_delay_ms: (u64, u64),
    /// Per-source circuit breaker. Disabled when `failure_threshold` is 0.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Per-source overrides keyed by source name.
    pub sources: BTreeMap<String, SourceSettings>,
}

/// Per-source overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Whether the source is queried by default.
    pub enabled: bool,
    /// Lower numbers are queried and ranked first.
    pub priority: i32,
    /// Overrides `max_products_per_source` for this source.
    pub max_products: Option<usize>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: DEFAULT_SOURCE_PRIORITY,
            max_products: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_products_per_source: 20,
            min_confidence_score: 0.3,
            parallel_scraping: true,
            retry_attempts: 3,
            timeout_per_source: 30.0,
            cache_ttl_seconds: 3600,
            cache_max_entries: 256,
            trusted_sources: Vec::new(),
            request_delay_ms: (0, 0),
            circuit_breaker: CircuitBreakerConfig::default(),
            sources: BTreeMap::new(),
        }
    }
}

impl CatalogConfig {
    /// Load configuration from a file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Io`] if the file cannot be read and
    /// [`SearchError::Config`] if it cannot be parsed or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SearchError::Config(e.to_string()))
    }

    /// Parse configuration from a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| SearchError::Config(e.to_string()))
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_products_per_source` and every per-source `max_products` > 0
    /// - `timeout_per_source` is finite and > 0
    /// - `min_confidence_score` lies in `[0, 1]`
    /// - `request_delay_ms.0` <= `request_delay_ms.1`
    pub fn validate(&self) -> Result<()> {
        if self.max_products_per_source == 0 {
            return Err(SearchError::Config(
                "max_products_per_source must be greater than 0".into(),
            ));
        }
        if !self.timeout_per_source.is_finite() || self.timeout_per_source <= 0.0 {
            return Err(SearchError::Config(
                "timeout_per_source must be greater than 0".into(),
            ));
        }
        if Duration::try_from_secs_f64(self.timeout_per_source).is_err() {
            return Err(SearchError::Config(
                "timeout_per_source is out of range".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence_score) {
            return Err(SearchError::Config(
                "min_confidence_score must be between 0 and 1".into(),
            ));
        }
        if self.request_delay_ms.0 > self.request_delay_ms.1 {
            return Err(SearchError::Config(
                "request_delay_ms min must be <= max".into(),
            ));
        }
        if let Some((name, _)) = self
            .sources
            .iter()
            .find(|(_, settings)| settings.max_products == Some(0))
        {
            return Err(SearchError::Config(format!(
                "sources.{name}.max_products must be greater than 0"
            )));
        }
        Ok(())
    }

    /// The per-source timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_per_source)
            .unwrap_or(Duration::from_secs(30))
    }

    /// Settings for `name`, or the defaults when it has no entry.
    pub fn source_settings(&self, name: &str) -> SourceSettings {
        self.sources.get(name).cloned().unwrap_or_default()
    }
}
