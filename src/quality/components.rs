//! Individual quality components
//!
//! Every function returns a value in `[0, 1]`.

use crate::extraction::text::{average_sentence_length, words};
use chrono::{DateTime, Utc};

/// Words per sentence considered ideal
pub const IDEAL_SENTENCE_LENGTH: f64 = 17.5;

/// Freshness assumed when no publish date is found
pub const UNDATED_FRESHNESS: f64 = 0.3;

const FRESHNESS_HORIZON_DAYS: f64 = 365.0;

/// Words at least this long count as technical vocabulary
const LONG_WORD_CHARS: usize = 9;

const AUTHORITY_TERMS: &[&str] = &[
    "research",
    "study",
    "report",
    "analysis",
    "survey",
    "findings",
    "evidence",
    "statistics",
    "according to",
    "published",
];

const AUTHORITY_TLDS: &[&str] = &["edu", "gov", "org"];

const INTERROGATIVES: &[&str] = &["how", "what", "why", "when", "where", "which", "who"];

/// Closeness of the average sentence length to 17.5 words
pub fn readability(text: &str) -> f64 {
    let average = average_sentence_length(text);
    if average == 0.0 {
        return 0.0;
    }
    (1.0 - (average - IDEAL_SENTENCE_LENGTH).abs() / IDEAL_SENTENCE_LENGTH).max(0.0)
}

/// Extracted text size relative to the raw document
pub fn density(text: &str, raw_size: usize) -> f64 {
    if raw_size == 0 {
        return 0.0;
    }
    (text.len() as f64 / raw_size as f64).min(1.0)
}

/// Presence of headings, lists, quotes and figures
pub fn semantic_richness(headings: usize, lists: usize, quotes: usize, text: &str) -> f64 {
    let mut score = 0.0;
    if headings > 0 {
        score += 0.3;
    }
    if lists > 0 {
        score += 0.25;
    }
    if quotes > 0 {
        score += 0.2;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += 0.25;
    }
    f64::min(score, 1.0)
}

/// Linear decay over a year from the publish date
///
/// Undated content gets a flat 0.3; dates in the future count as brand new.
pub fn freshness(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published) = published else {
        return UNDATED_FRESHNESS;
    };
    let age_days = (now - published).num_seconds() as f64 / 86_400.0;
    (1.0 - age_days.max(0.0) / FRESHNESS_HORIZON_DAYS).clamp(0.0, 1.0)
}

/// Source authority from vocabulary, top-level domain and length
pub fn authority(text: &str, domain: &str, word_count: usize) -> f64 {
    let lower = text.to_lowercase();
    let mut score: f64 = 0.3;

    if AUTHORITY_TERMS.iter().any(|term| lower.contains(term)) {
        score += 0.2;
    }
    let tld = domain.rsplit('.').next().unwrap_or("");
    if AUTHORITY_TLDS.contains(&tld) {
        score += 0.3;
    }
    if word_count > 500 {
        score += 0.2;
    }
    score.min(1.0)
}

/// Signals that a reader will stay with the page
pub fn engagement(text: &str, word_count: usize, headings: usize, lists: usize) -> f64 {
    let mut score: f64 = 0.0;
    if word_count > 300 {
        score += 0.3;
    }
    if headings > 2 {
        score += 0.2;
    }
    if lists > 0 {
        score += 0.2;
    }
    if text.contains('?') {
        score += 0.15;
    }
    let has_interrogative = words(text)
        .iter()
        .any(|w| INTERROGATIVES.contains(&w.to_lowercase().as_str()));
    if has_interrogative {
        score += 0.15;
    }
    score.min(1.0)
}

/// Density of figures, proper nouns, technical words and headings
///
/// Each signal is a rate per 100 words, saturating at a reference rate, then
/// weighted: numerals 0.3 (5 per 100), capitalised tokens 0.3 (10 per 100),
/// long words 0.25 (15 per 100), headings 0.15 (1 per 100).
pub fn information_density(text: &str, headings: usize) -> f64 {
    let tokens = words(text);
    if tokens.is_empty() {
        return 0.0;
    }
    let per_100 = |count: usize| count as f64 * 100.0 / tokens.len() as f64;
    let saturate = |rate: f64, reference: f64| (rate / reference).min(1.0);

    let numerals = tokens
        .iter()
        .filter(|t| t.chars().any(|c| c.is_ascii_digit()))
        .count();
    let capitalized = tokens
        .iter()
        .filter(|t| t.chars().next().map(char::is_uppercase).unwrap_or(false))
        .count();
    let long_words = tokens
        .iter()
        .filter(|t| t.chars().count() >= LONG_WORD_CHARS)
        .count();

    let score = 0.3 * saturate(per_100(numerals), 5.0)
        + 0.3 * saturate(per_100(capitalized), 10.0)
        + 0.25 * saturate(per_100(long_words), 15.0)
        + 0.15 * saturate(per_100(headings), 1.0);
    score.min(1.0)
}
