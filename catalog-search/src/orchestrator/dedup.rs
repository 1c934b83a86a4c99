//! Near-duplicate collapsing by title similarity.
//!
//! Different catalogs list the same product under slightly different titles.
//! Walking the score-sorted list and comparing each candidate's title tokens
//! against every title already accepted keeps the best-scored instance of
//! each product and drops the rest.

use std::collections::HashSet;

use crate::types::ProductRecord;

use super::scoring::tokens;

/// Titles more similar than this are considered the same product.
pub const DUPLICATE_THRESHOLD: f64 = 0.8;

/// Jaccard similarity of the whitespace-token sets of two titles.
///
/// Returns 0.0 when either side has no tokens.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    set_similarity(&tokens(a), &tokens(b))
}

fn set_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Collapse near-duplicates from a score-sorted list, keeping at most `limit`.
///
/// The first (highest-scored) record of each group of similar titles wins.
/// Records without a real title are always kept and never block others.
/// Stops as soon as `limit` records have been accepted.
pub fn deduplicate(records: Vec<ProductRecord>, limit: usize) -> Vec<ProductRecord> {
    let mut accepted: Vec<ProductRecord> = Vec::with_capacity(limit.min(records.len()));
    let mut seen_titles: Vec<HashSet<String>> = Vec::new();

    for record in records {
        if accepted.len() >= limit {
            break;
        }

        if !record.has_title() {
            accepted.push(record);
            continue;
        }

        let title_tokens = tokens(&record.title);
        let is_duplicate = seen_titles
            .iter()
            .any(|seen| set_similarity(&title_tokens, seen) > DUPLICATE_THRESHOLD);

        if is_duplicate {
            tracing::trace!(source = %record.source_name, "dropping near-duplicate listing");
            continue;
        }

        seen_titles.push(title_tokens);
        accepted.push(record);
    }

    accepted
}
