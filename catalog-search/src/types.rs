//! Core types for catalog listings and canonical product records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel stored in a [`ProductRecord`] field the source did not provide.
pub const NOT_AVAILABLE: &str = "N/A";

/// Opaque, source-specific listing as returned by an adapter.
///
/// Normally a JSON object. Only the normalizer looks inside it.
pub type RawListing = serde_json::Value;

/// Free-form extras carried alongside a product record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A product in the source-agnostic shape used for ranking, dedup and caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product title as displayed by the catalog.
    pub title: String,
    /// Display price, kept as the catalog formatted it.
    pub price: String,
    /// Canonicalised image URL.
    pub image_url: String,
    /// Canonicalised product page URL.
    pub product_url: String,
    /// Registry name of the source that produced this record.
    pub source_name: String,
    /// Relevance/quality score in `[0, 1]`. Always assigned by the scorer.
    pub confidence_score: f64,
    /// When the record was normalized.
    pub extracted_at: DateTime<Utc>,
    /// Fields of the raw listing that have no canonical counterpart.
    #[serde(default)]
    pub metadata: Metadata,
}

impl ProductRecord {
    /// Returns `true` if the title is usable for matching and dedup.
    pub fn has_title(&self) -> bool {
        is_present(&self.title)
    }
}

/// Returns `true` if a field holds a real value rather than a sentinel.
pub fn is_present(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != NOT_AVAILABLE
}
