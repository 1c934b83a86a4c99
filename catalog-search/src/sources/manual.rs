//! Manual fallback source: a "contact us" placeholder for any term.
//!
//! When no catalog has what the customer asked for, this source still
//! offers one listing that routes them to a human. Give it a high priority
//! number so it ranks after real catalogs.

use async_trait::async_trait;
use serde_json::json;

use crate::error::FetchError;
use crate::source::SourceAdapter;
use crate::types::RawListing;

/// Registry name used when none is given.
pub const DEFAULT_NAME: &str = "manual_fallback";

const DEFAULT_IMAGE_URL: &str = "https://via.placeholder.com/150x150?text=Manual+Product";

/// Returns a single placeholder listing per search.
#[derive(Debug, Clone)]
pub struct ManualFallbackSource {
    name: String,
    contact_url: String,
    image_url: String,
}

impl ManualFallbackSource {
    /// Create a fallback pointing customers at `contact_url`.
    pub fn new(contact_url: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            contact_url: contact_url.into(),
            image_url: DEFAULT_IMAGE_URL.to_owned(),
        }
    }

    /// Register under a different name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use a different placeholder image.
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }
}

#[async_trait]
impl SourceAdapter for ManualFallbackSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<RawListing>, FetchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![json!({
            "title": format!("Manual Product - {}", term.trim()),
            "price": "Contact for pricing",
            "image_url": self.image_url,
            "product_url": self.contact_url,
            "type": "manual_fallback",
            "requires_contact": true,
        })])
    }
}
