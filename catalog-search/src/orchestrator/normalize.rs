//! Raw listing → canonical [`ProductRecord`] conversion.
//!
//! Each source hands back listings in its own shape. The normalizer looks up
//! the canonical fields through the source's [`FieldMap`], fills anything
//! missing with the [`NOT_AVAILABLE`] sentinel and keeps every field it did
//! not consume in the record's metadata. A malformed listing is skipped on
//! its own; it never fails the rest of the batch.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::source::FieldMap;
use crate::types::{Metadata, ProductRecord, RawListing, NOT_AVAILABLE};

use super::url_normalize::normalize_url;

/// Why a single listing could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListingError {
    /// The listing is not a JSON object.
    #[error("listing is not an object")]
    NotAnObject,

    /// A canonical field holds an array or object instead of a scalar.
    #[error("field `{0}` is not a scalar value")]
    NonScalarField(String),
}

/// Normalize every listing of one source, skipping malformed ones.
pub fn normalize_batch(
    source_name: &str,
    listings: Vec<RawListing>,
    field_map: &FieldMap,
) -> Vec<ProductRecord> {
    let extracted_at = Utc::now();
    let total = listings.len();

    let records: Vec<ProductRecord> = listings
        .into_iter()
        .enumerate()
        .filter_map(|(index, listing)| {
            match normalize_listing(source_name, listing, field_map, extracted_at) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(source = source_name, index, error = %err, "skipping malformed listing");
                    None
                }
            }
        })
        .collect();

    if records.len() < total {
        tracing::debug!(
            source = source_name,
            kept = records.len(),
            total,
            "normalized batch with skipped listings"
        );
    }
    records
}

/// Normalize a single listing.
///
/// # Errors
///
/// Returns [`ListingError`] if the listing is not an object or one of the
/// canonical fields holds a non-scalar value.
pub fn normalize_listing(
    source_name: &str,
    listing: RawListing,
    field_map: &FieldMap,
    extracted_at: DateTime<Utc>,
) -> Result<ProductRecord, ListingError> {
    let Value::Object(mut fields) = listing else {
        return Err(ListingError::NotAnObject);
    };

    let title = extract(&mut fields, &field_map.title)?;
    let price = extract(&mut fields, &field_map.price)?;
    let image_url = extract(&mut fields, &field_map.image_url)?;
    let product_url = extract(&mut fields, &field_map.product_url)?;

    Ok(ProductRecord {
        title: title.unwrap_or_else(|| NOT_AVAILABLE.to_owned()),
        price: price.unwrap_or_else(|| NOT_AVAILABLE.to_owned()),
        image_url: image_url.map_or_else(|| NOT_AVAILABLE.to_owned(), |u| normalize_url(&u)),
        product_url: product_url.map_or_else(|| NOT_AVAILABLE.to_owned(), |u| normalize_url(&u)),
        source_name: source_name.to_owned(),
        confidence_score: 0.0,
        extracted_at,
        metadata: fields,
    })
}

/// Take the first present candidate out of `fields`.
///
/// A top-level key that supplies the value is removed so it does not also
/// land in metadata; nested paths leave their parent object in place.
fn extract(fields: &mut Metadata, candidates: &[String]) -> Result<Option<String>, ListingError> {
    for path in candidates {
        let Some(value) = lookup(fields, path) else {
            continue;
        };
        let Some(text) = scalar_text(value).map_err(|()| ListingError::NonScalarField(path.clone()))?
        else {
            continue;
        };
        if !path.contains('.') {
            fields.remove(path);
        }
        return Ok(Some(text));
    }
    Ok(None)
}

fn lookup<'a>(fields: &'a Metadata, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Render a scalar as display text. `Ok(None)` means "treat as absent".
fn scalar_text(value: &Value) -> Result<Option<String>, ()> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(()),
    }
}
