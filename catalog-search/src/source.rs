//! Trait definition for pluggable catalog sources.
//!
//! Every external catalog (a retailer site, a marketplace API, a curated
//! list) implements [`SourceAdapter`] so the orchestrator can query them
//! uniformly. Adapters return raw, source-shaped listings; turning those into
//! [`ProductRecord`](crate::types::ProductRecord)s is the normalizer's job,
//! steered by the adapter's [`FieldMap`].

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::RawListing;

/// A pluggable catalog backend.
///
/// Implementations handle their own transport, parsing, bot detection and
/// retries. They must be `Send + Sync` so they can be queried concurrently.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry name of this source. Must be unique within one engine.
    fn name(&self) -> &str;

    /// Fetch up to `limit` listings matching `term`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on any transport, parse or blocking problem.
    /// The orchestrator isolates the failure to this source.
    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<RawListing>, FetchError>;

    /// Where the canonical fields live in this source's raw listings.
    fn field_map(&self) -> FieldMap {
        FieldMap::default()
    }
}

/// Candidate key paths for each canonical product field.
///
/// Paths are dot-separated to reach into nested objects
/// (`"price_info.formatted"`). The first candidate present in a listing wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    /// Candidates for the product title.
    pub title: Vec<String>,
    /// Candidates for the display price.
    pub price: Vec<String>,
    /// Candidates for the image URL.
    pub image_url: Vec<String>,
    /// Candidates for the product page URL.
    pub product_url: Vec<String>,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            title: owned(&["seo_title", "title", "name"]),
            price: owned(&["price_info.formatted", "price", "formatted_price"]),
            image_url: owned(&["image_url", "imageUrl", "image", "img"]),
            product_url: owned(&["product_url", "productUrl", "url", "link"]),
        }
    }
}

impl FieldMap {
    /// Replace the title candidates.
    pub fn with_title(mut self, keys: &[&str]) -> Self {
        self.title = owned(keys);
        self
    }

    /// Replace the price candidates.
    pub fn with_price(mut self, keys: &[&str]) -> Self {
        self.price = owned(keys);
        self
    }

    /// Replace the image URL candidates.
    pub fn with_image_url(mut self, keys: &[&str]) -> Self {
        self.image_url = owned(keys);
        self
    }

    /// Replace the product URL candidates.
    pub fn with_product_url(mut self, keys: &[&str]) -> Self {
        self.product_url = owned(keys);
        self
    }
}

fn owned(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| (*k).to_owned()).collect()
}
