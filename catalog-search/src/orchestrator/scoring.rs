//! Confidence scoring for normalized product records.
//!
//! The score is an additive, explainable heuristic capped at 1.0:
//!
//! | Signal                                          | Weight              |
//! |-------------------------------------------------|---------------------|
//! | normalized term is a substring of the title     | +0.4                |
//! | term tokens shared with the title               | +0.1 each, max 3    |
//! | price present                                   | +0.2                |
//! | image URL present                               | +0.1                |
//! | product URL present                             | +0.1                |
//! | source is on the trusted list                   | +0.1                |
//!
//! It is a pure function of the term and the record, so a learned ranker can
//! replace it without touching orchestration.

use std::collections::HashSet;

use crate::types::{is_present, ProductRecord};

const SUBSTRING_WEIGHT: f64 = 0.4;
const TOKEN_WEIGHT: f64 = 0.1;
const MAX_SHARED_TOKENS: usize = 3;
const PRICE_WEIGHT: f64 = 0.2;
const IMAGE_WEIGHT: f64 = 0.1;
const URL_WEIGHT: f64 = 0.1;
const TRUSTED_WEIGHT: f64 = 0.1;

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased whitespace tokens of `text`.
pub fn tokens(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Compute the confidence score of `record` for `term`.
///
/// Title signals only apply when the record has a real title. The result is
/// always within `[0, 1]`.
pub fn confidence_score(term: &str, record: &ProductRecord, trusted_sources: &[String]) -> f64 {
    let mut score = 0.0;

    if record.has_title() {
        let normalized_term = normalize_text(term);
        let normalized_title = normalize_text(&record.title);
        if !normalized_term.is_empty() && normalized_title.contains(&normalized_term) {
            score += SUBSTRING_WEIGHT;
        }

        let shared = tokens(term).intersection(&tokens(&record.title)).count();
        score += shared.min(MAX_SHARED_TOKENS) as f64 * TOKEN_WEIGHT;
    }

    if is_present(&record.price) {
        score += PRICE_WEIGHT;
    }
    if is_present(&record.image_url) {
        score += IMAGE_WEIGHT;
    }
    if is_present(&record.product_url) {
        score += URL_WEIGHT;
    }
    if trusted_sources.iter().any(|s| s == &record.source_name) {
        score += TRUSTED_WEIGHT;
    }

    score.clamp(0.0, 1.0)
}

/// Score every record and sort descending.
///
/// The sort is stable, so records with equal scores keep their incoming
/// order, which the orchestrator arranges by source priority.
pub fn score_and_rank(
    term: &str,
    mut records: Vec<ProductRecord>,
    trusted_sources: &[String],
) -> Vec<ProductRecord> {
    for record in &mut records {
        record.confidence_score = confidence_score(term, record, trusted_sources);
    }
    records.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
    records
}

/// Keep only records scoring at least `min_confidence`.
///
/// `search` never filters by score; callers that want the configured
/// `min_confidence_score` cut-off apply it with this.
pub fn filter_by_confidence(records: Vec<ProductRecord>, min_confidence: f64) -> Vec<ProductRecord> {
    records
        .into_iter()
        .filter(|r| r.confidence_score >= min_confidence)
        .collect()
}
