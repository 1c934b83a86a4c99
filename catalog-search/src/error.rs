//! Error types for the catalog-search crate.
//!
//! Two layers exist. [`FetchError`] describes a single source failing and
//! never escapes a search: the orchestrator logs it and folds it into the
//! source's health stats. [`SearchError`] is what callers of the public API
//! can actually see.

use std::time::Duration;

/// Errors a [`SourceAdapter`](crate::source::SourceAdapter) reports for one fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The catalog could not be reached or answered with an error status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The catalog answered but its payload could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    /// The catalog is rate limiting or showing a bot challenge.
    #[error("blocked: {0}")]
    Blocked(String),

    /// The fetch did not settle within the per-source timeout.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Any other adapter-specific failure.
    #[error("source error: {0}")]
    Other(String),
}

impl FetchError {
    /// Returns `true` for the timeout variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors surfaced by the catalog search API.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The caller passed an unusable argument (empty term, zero limit,
    /// unknown source name).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration. Only raised while building a [`CatalogSearch`](crate::CatalogSearch).
    #[error("config error: {0}")]
    Config(String),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for catalog-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
