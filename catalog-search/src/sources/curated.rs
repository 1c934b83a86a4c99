//! Curated catalog source: an in-memory list of hand-picked listings.
//!
//! Useful for products sold through channels that have no searchable site.
//! A listing matches when its title shares at least one token with the term.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::orchestrator::scoring::tokens;
use crate::source::{FieldMap, SourceAdapter};
use crate::types::RawListing;

/// Serves listings from memory.
#[derive(Debug, Clone)]
pub struct CuratedCatalogSource {
    name: String,
    listings: Vec<RawListing>,
    field_map: FieldMap,
}

impl CuratedCatalogSource {
    /// Create a source named `name` over `listings`.
    pub fn new(name: impl Into<String>, listings: Vec<RawListing>) -> Self {
        Self {
            name: name.into(),
            listings,
            field_map: FieldMap::default(),
        }
    }

    /// Use a custom field map for the stored listings.
    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = field_map;
        self
    }

    fn title_of<'a>(&self, listing: &'a RawListing) -> Option<&'a str> {
        self.field_map
            .title
            .iter()
            .find_map(|key| listing.get(key).and_then(|v| v.as_str()))
    }
}

#[async_trait]
impl SourceAdapter for CuratedCatalogSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, term: &str, limit: usize) -> Result<Vec<RawListing>, FetchError> {
        let wanted = tokens(term);
        Ok(self
            .listings
            .iter()
            .filter(|listing| {
                self.title_of(listing)
                    .is_some_and(|title| !tokens(title).is_disjoint(&wanted))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn field_map(&self) -> FieldMap {
        self.field_map.clone()
    }
}
