//! Source fan-out with per-source timeouts and failure isolation.
//!
//! [`Orchestrator::run`] queries a priority-ordered list of sources either
//! concurrently or one at a time. Every call is bounded by the per-source
//! timeout, and a timeout is reported exactly like any other adapter error,
//! so one bad source can never fail or stall the whole search. The returned
//! outcomes always follow the input order, whatever order the fetches
//! settled in.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::CatalogConfig;
use crate::error::FetchError;
use crate::source::SourceAdapter;
use crate::types::RawListing;

/// How sources are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// Launch every fetch at once and wait for all of them to settle.
    Parallel,
    /// Await each fetch before starting the next, in priority order.
    Sequential,
}

/// One source to query and how many listings to ask it for.
#[derive(Clone)]
pub struct SourceRequest {
    pub adapter: Arc<dyn SourceAdapter>,
    pub limit: usize,
}

/// What one source produced.
#[derive(Debug)]
pub struct SourceOutcome {
    /// Registry name of the source.
    pub source: String,
    /// Listings on success, the failure otherwise.
    pub result: Result<Vec<RawListing>, FetchError>,
    /// Wall-clock time spent on the fetch, including a timed-out one.
    pub elapsed: Duration,
}

/// Runs adapters according to the configured concurrency mode.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    mode: ConcurrencyMode,
    timeout: Duration,
    request_delay_ms: (u64, u64),
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(mode: ConcurrencyMode, timeout: Duration) -> Self {
        Self {
            mode,
            timeout,
            request_delay_ms: (0, 0),
        }
    }

    /// Create an orchestrator from the engine configuration.
    pub fn from_config(config: &CatalogConfig) -> Self {
        let mode = if config.parallel_scraping {
            ConcurrencyMode::Parallel
        } else {
            ConcurrencyMode::Sequential
        };
        Self::new(mode, config.timeout()).with_request_delay(config.request_delay_ms)
    }

    /// Sleep a random `(min, max)` millisecond delay between sequential fetches.
    ///
    /// An inverted range is clamped to `max..=max`.
    pub fn with_request_delay(mut self, request_delay_ms: (u64, u64)) -> Self {
        self.request_delay_ms = request_delay_ms;
        self
    }

    /// Configured concurrency mode.
    pub fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    /// Query every source in `requests` for `term`.
    ///
    /// Returns one outcome per request, in request order, once every fetch
    /// has settled.
    pub async fn run(&self, requests: &[SourceRequest], term: &str) -> Vec<SourceOutcome> {
        match self.mode {
            ConcurrencyMode::Parallel => {
                let fetches = requests
                    .iter()
                    .map(|request| fetch_one(request, term, self.timeout));
                futures::future::join_all(fetches).await
            }
            ConcurrencyMode::Sequential => {
                let mut outcomes = Vec::with_capacity(requests.len());
                for (index, request) in requests.iter().enumerate() {
                    if index > 0 {
                        if let Some(delay) = self.random_delay() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                    outcomes.push(fetch_one(request, term, self.timeout).await);
                }
                outcomes
            }
        }
    }

    fn random_delay(&self) -> Option<Duration> {
        let (min, max) = self.request_delay_ms;
        if max == 0 {
            return None;
        }
        let millis = rand::thread_rng().gen_range(min.min(max)..=max);
        Some(Duration::from_millis(millis))
    }
}

/// Fetch from one source, bounded by `timeout`.
async fn fetch_one(request: &SourceRequest, term: &str, timeout: Duration) -> SourceOutcome {
    let source = request.adapter.name().to_owned();
    let started = Instant::now();

    let result = match tokio::time::timeout(timeout, request.adapter.fetch(term, request.limit)).await
    {
        Ok(Ok(mut listings)) => {
            listings.truncate(request.limit);
            tracing::debug!(source = %source, count = listings.len(), "source returned listings");
            Ok(listings)
        }
        Ok(Err(err)) => {
            tracing::warn!(source = %source, error = %err, "source fetch failed");
            Err(err)
        }
        Err(_) => {
            let err = FetchError::Timeout(timeout);
            tracing::warn!(source = %source, error = %err, "source fetch timed out");
            Err(err)
        }
    };

    SourceOutcome {
        source,
        result,
        elapsed: started.elapsed(),
    }
}
