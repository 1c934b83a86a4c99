//! Source registry: per-source configuration and rolling health.
//!
//! Each registered adapter gets a [`SourceDescriptor`] built from the config
//! at startup. Descriptors are never removed, only toggled or re-prioritised,
//! and their health stats are updated after every fetch attempt.
//!
//! Health uses one exponential moving average (α = 0.1) for both the success
//! rate and the response time. The success rate starts at 1.0, so every
//! failure strictly lowers it.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::circuit_breaker::{Circuit, CircuitBreakerConfig, CircuitState};
use crate::config::CatalogConfig;
use crate::error::{Result, SearchError};

/// Weight of the newest sample in the moving averages.
const SMOOTHING: f64 = 0.1;

/// Mutable state of one source.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Registry name.
    pub name: String,
    /// Lower numbers are queried and ranked first.
    pub priority: i32,
    /// Whether the source takes part in default searches.
    pub enabled: bool,
    /// Listings requested from and kept for this source per search.
    pub max_products: usize,
    /// Moving average of fetch outcomes, in `[0, 1]`.
    pub success_rate: f64,
    /// Moving average of fetch latency.
    pub avg_response_time: Duration,
    /// When the source last fetched successfully.
    pub last_success: Option<DateTime<Utc>>,
    /// Fetch attempts recorded so far.
    pub attempts: u64,
    circuit: Circuit,
}

impl SourceDescriptor {
    fn new(name: &str, config: &CatalogConfig) -> Self {
        let settings = config.source_settings(name);
        Self {
            name: name.to_owned(),
            priority: settings.priority,
            enabled: settings.enabled,
            max_products: settings
                .max_products
                .unwrap_or(config.max_products_per_source),
            success_rate: 1.0,
            avg_response_time: Duration::ZERO,
            last_success: None,
            attempts: 0,
            circuit: Circuit::default(),
        }
    }

    /// Current circuit breaker state.
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// Read-only view for introspection.
    pub fn stats(&self) -> SourceStats {
        SourceStats {
            enabled: self.enabled,
            priority: self.priority,
            max_products: self.max_products,
            success_rate: self.success_rate,
            avg_response_time_ms: self.avg_response_time.as_secs_f64() * 1000.0,
            last_success: self.last_success,
            attempts: self.attempts,
            consecutive_failures: self.circuit.consecutive_failures(),
            circuit: self.circuit.state(),
        }
    }
}

/// Serializable health and config snapshot of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Whether the source takes part in default searches.
    pub enabled: bool,
    /// Lower numbers are queried and ranked first.
    pub priority: i32,
    /// Per-search listing cap.
    pub max_products: usize,
    /// Moving average of fetch outcomes, in `[0, 1]`.
    pub success_rate: f64,
    /// Moving average of fetch latency, in milliseconds.
    pub avg_response_time_ms: f64,
    /// When the source last fetched successfully.
    pub last_success: Option<DateTime<Utc>>,
    /// Fetch attempts recorded so far.
    pub attempts: u64,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Circuit breaker state.
    pub circuit: CircuitState,
}

/// All sources known to one engine.
#[derive(Debug)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceDescriptor>,
    breaker: CircuitBreakerConfig,
}

impl SourceRegistry {
    /// Build descriptors for `names` from `config`.
    ///
    /// Config entries that name no registered source are ignored with a warning.
    pub fn new<'a>(config: &CatalogConfig, names: impl IntoIterator<Item = &'a str>) -> Self {
        let sources: BTreeMap<String, SourceDescriptor> = names
            .into_iter()
            .map(|name| (name.to_owned(), SourceDescriptor::new(name, config)))
            .collect();

        for name in config.sources.keys() {
            if !sources.contains_key(name) {
                tracing::warn!(source = %name, "configured source has no adapter; ignoring");
            }
        }

        Self {
            sources,
            breaker: config.circuit_breaker.clone(),
        }
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of enabled sources.
    pub fn enabled_count(&self) -> usize {
        self.sources.values().filter(|s| s.enabled).count()
    }

    /// Look up one descriptor.
    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.get(name)
    }

    /// Enable or disable a source.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidArgument`] for an unknown source.
    pub fn enable_source(&mut self, name: &str, enabled: bool) -> Result<()> {
        let source = self.get_mut(name)?;
        source.enabled = enabled;
        tracing::info!(source = name, enabled, "source toggled");
        Ok(())
    }

    /// Change a source's priority (lower = first).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidArgument`] for an unknown source.
    pub fn set_priority(&mut self, name: &str, priority: i32) -> Result<()> {
        let source = self.get_mut(name)?;
        source.priority = priority;
        tracing::info!(source = name, priority, "source priority set");
        Ok(())
    }

    /// Enabled sources sorted by priority, ties broken by name.
    pub fn ordered_enabled_sources(&self) -> Vec<String> {
        let mut enabled: Vec<&SourceDescriptor> =
            self.sources.values().filter(|s| s.enabled).collect();
        sort_by_priority(&mut enabled);
        enabled.into_iter().map(|s| s.name.clone()).collect()
    }

    /// Resolve an explicit subset, sorted like [`Self::ordered_enabled_sources`].
    ///
    /// Disabled sources are honoured when named explicitly. Duplicates collapse.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidArgument`] if any name is unknown.
    pub fn ordered_sources(&self, subset: &[String]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(subset.len());
        for name in subset {
            let source = self
                .sources
                .get(name)
                .ok_or_else(|| unknown_source(name))?;
            if seen.insert(name.as_str()) {
                selected.push(source);
            }
        }
        sort_by_priority(&mut selected);
        Ok(selected.into_iter().map(|s| s.name.clone()).collect())
    }

    /// Filter `names` through each source's circuit breaker.
    ///
    /// Sources whose circuit is open and still cooling down are left out, as
    /// are half-open sources whose single probe is already in flight.
    pub fn admit(&mut self, names: Vec<String>) -> Vec<String> {
        let breaker = self.breaker.clone();
        names
            .into_iter()
            .filter(|name| {
                let Some(source) = self.sources.get_mut(name) else {
                    return false;
                };
                let allowed = source.circuit.should_attempt(&breaker);
                if !allowed {
                    tracing::debug!(source = %name, "circuit open; skipping source");
                }
                allowed
            })
            .collect()
    }

    /// Fold one fetch outcome into a source's health stats.
    pub fn record_outcome(&mut self, name: &str, success: bool, elapsed: Duration) {
        let breaker = self.breaker.clone();
        let Some(source) = self.sources.get_mut(name) else {
            return;
        };

        source.avg_response_time = if source.attempts == 0 {
            elapsed
        } else {
            let blended = source.avg_response_time.as_secs_f64() * (1.0 - SMOOTHING)
                + elapsed.as_secs_f64() * SMOOTHING;
            Duration::from_secs_f64(blended)
        };
        source.attempts += 1;

        if success {
            source.success_rate = (source.success_rate * (1.0 - SMOOTHING) + SMOOTHING).min(1.0);
            source.last_success = Some(Utc::now());
            source.circuit.record_success();
        } else {
            source.success_rate *= 1.0 - SMOOTHING;
            source.circuit.record_failure(&breaker);
        }
    }

    /// Stats for every source, keyed by name.
    pub fn snapshot(&self) -> BTreeMap<String, SourceStats> {
        self.sources
            .iter()
            .map(|(name, source)| (name.clone(), source.stats()))
            .collect()
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut SourceDescriptor> {
        self.sources.get_mut(name).ok_or_else(|| unknown_source(name))
    }
}

fn sort_by_priority(sources: &mut [&SourceDescriptor]) {
    sources.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
}

fn unknown_source(name: &str) -> SearchError {
    SearchError::InvalidArgument(format!("unknown source: {name}"))
}
