//! Search orchestrator: source fan-out, normalization, scoring, dedup.
//!
//! This module queries catalog sources under per-source timeouts, turns
//! their raw listings into canonical records, scores them against the
//! search term, and collapses near-duplicates into the final ranked list.

pub mod dedup;
pub mod fetch;
pub mod normalize;
pub mod scoring;
pub mod url_normalize;

use crate::types::ProductRecord;

/// Score, sort and deduplicate merged records, keeping at most `limit`.
///
/// `records` must arrive in source-priority order; the stable sort keeps
/// that order among equal scores.
pub fn rank_records(
    term: &str,
    records: Vec<ProductRecord>,
    trusted_sources: &[String],
    limit: usize,
) -> Vec<ProductRecord> {
    let ranked = scoring::score_and_rank(term, records, trusted_sources);
    dedup::deduplicate(ranked, limit)
}
