//! Content quality scoring
//!
//! # Components
//!
//! | Component | Weight |
//! |-----------|--------|
//! | readability | 0.15 |
//! | density | 0.10 |
//! | semantic richness | 0.25 |
//! | freshness | 0.15 |
//! | authority | 0.15 |
//! | engagement | 0.10 |
//! | information density | 0.10 |
//!
//! The weighted sum is multiplied by `0.5 + 0.5 × (1 − duplicate similarity)`,
//! so a verbatim copy keeps at most half its score.

mod components;
mod duplicate;

pub use components::{
    authority, density, engagement, freshness, information_density, readability,
    semantic_richness, IDEAL_SENTENCE_LENGTH, UNDATED_FRESHNESS,
};
pub use duplicate::{content_hash, jaccard, word_set, DuplicateDetector, DEFAULT_WINDOW};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const W_READABILITY: f64 = 0.15;
const W_DENSITY: f64 = 0.10;
const W_SEMANTIC: f64 = 0.25;
const W_FRESHNESS: f64 = 0.15;
const W_AUTHORITY: f64 = 0.15;
const W_ENGAGEMENT: f64 = 0.10;
const W_INFORMATION: f64 = 0.10;

/// Quality breakdown for one page, every field in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub readability: f64,
    pub density: f64,
    pub semantic_richness: f64,
    pub freshness: f64,
    pub authority: f64,
    pub engagement: f64,
    pub duplicate_similarity: f64,
    pub uniqueness: f64,
    pub information_density: f64,
    pub overall: f64,
}

impl QualityMetrics {
    /// Returns true if the page is a near-duplicate at `threshold`
    pub fn is_near_duplicate(&self, threshold: f64) -> bool {
        self.duplicate_similarity >= threshold
    }

    /// Returns true if the content hash matched a page seen earlier
    pub fn is_exact_duplicate(&self) -> bool {
        self.duplicate_similarity >= 1.0
    }
}

/// What the scorer needs to know about a page
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub text: &'a str,
    pub word_count: usize,

    /// Size of the raw response body in bytes
    pub raw_size: usize,

    pub domain: &'a str,
    pub headings: usize,
    pub lists: usize,
    pub quotes: usize,
    pub published: Option<DateTime<Utc>>,
}

/// Metrics plus the content hash they were computed for
#[derive(Debug, Clone)]
pub struct Assessment {
    pub metrics: QualityMetrics,
    pub content_hash: String,
}

/// Composite scorer with a session-owned duplicate detector
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    detector: DuplicateDetector,
}

impl QualityScorer {
    /// Creates a scorer comparing against the last `window` pages
    pub fn new(window: usize) -> Self {
        Self {
            detector: DuplicateDetector::new(window),
        }
    }

    /// Scores a page and adds it to the duplicate window
    pub fn assess(&mut self, input: &ScoringInput<'_>) -> Assessment {
        self.assess_at(input, Utc::now())
    }

    /// `assess` with an explicit clock for freshness
    pub fn assess_at(&mut self, input: &ScoringInput<'_>, now: DateTime<Utc>) -> Assessment {
        let hash = content_hash(input.text);
        let words = word_set(input.text);
        let similarity = self.detector.similarity(&hash, &words);
        let metrics = score(input, similarity, now);

        self.detector.remember(hash.clone(), words);
        Assessment {
            metrics,
            content_hash: hash,
        }
    }

    pub fn detector(&self) -> &DuplicateDetector {
        &self.detector
    }
}

/// Computes all components for a page with a known duplicate similarity
pub fn score(input: &ScoringInput<'_>, duplicate_similarity: f64, now: DateTime<Utc>) -> QualityMetrics {
    let duplicate_similarity = duplicate_similarity.clamp(0.0, 1.0);

    let readability = readability(input.text);
    let density = density(input.text, input.raw_size);
    let semantic_richness =
        semantic_richness(input.headings, input.lists, input.quotes, input.text);
    let freshness = freshness(input.published, now);
    let authority = authority(input.text, input.domain, input.word_count);
    let engagement = engagement(input.text, input.word_count, input.headings, input.lists);
    let information_density = information_density(input.text, input.headings);

    let weighted = W_READABILITY * readability
        + W_DENSITY * density
        + W_SEMANTIC * semantic_richness
        + W_FRESHNESS * freshness
        + W_AUTHORITY * authority
        + W_ENGAGEMENT * engagement
        + W_INFORMATION * information_density;

    // Half of the overall multiplier; the other half is granted to every page
    let uniqueness = 0.5 * (1.0 - duplicate_similarity);
    let overall = (weighted * (0.5 + uniqueness)).clamp(0.0, 1.0);

    QualityMetrics {
        readability,
        density,
        semantic_richness,
        freshness,
        authority,
        engagement,
        duplicate_similarity,
        uniqueness,
        information_density,
        overall,
    }
}
