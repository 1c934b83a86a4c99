//! Built-in sources that need no network access.
//!
//! Each module provides a struct implementing [`crate::source::SourceAdapter`].
//! Adapters for real catalogs live with the application that owns their
//! scraping logic.

pub mod curated;
pub mod manual;

pub use curated::CuratedCatalogSource;
pub use manual::ManualFallbackSource;
