//! URL canonicalisation for product and image links.
//!
//! Catalog links routinely carry session and tracking parameters that differ
//! per request. Canonicalising them keeps cached records stable and makes
//! identical products from repeated fetches compare equal.

use url::Url;

/// Tracking query parameters that are stripped during normalisation.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "spm",
    "scm",
    "algo_pvid",
    "algo_exp_id",
    "aff_fcid",
    "aff_fsk",
    "aff_platform",
    "aff_trace_key",
    "pdp_npi",
    "_t",
    "ref",
];

/// Normalise a product or image URL.
///
/// 1. Lowercase scheme and host (path is preserved as-is).
/// 2. Remove default ports (`:80` for HTTP, `:443` for HTTPS).
/// 3. Strip known tracking parameters and sort the rest by key.
/// 4. Remove the fragment.
///
/// Anything that does not parse as an absolute URL (including the `"N/A"`
/// sentinel and relative paths) is returned trimmed but otherwise unchanged.
///
/// # Examples
///
/// ```
/// use catalog_search::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("https://Shop.Example.COM/item/42?spm=a2g0o&color=red#reviews");
/// assert_eq!(a, "https://shop.example.com/item/42?color=red");
/// ```
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    if parsed.cannot_be_a_base() {
        return trimmed.to_string();
    }

    parsed.set_fragment(None);

    if is_default_port(&parsed) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(params);
    }

    parsed.to_string()
}

/// Returns `true` if the URL uses the default port for its scheme.
fn is_default_port(url: &Url) -> bool {
    matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    )
}
