use std::collections::HashMap;

/// Lowest score a domain can fall to
pub const MIN_HEALTH: f64 = 0.1;

/// Score of a domain that has not failed yet
pub const MAX_HEALTH: f64 = 1.0;

const SUCCESS_STEP: f64 = 0.1;
const FAILURE_STEP: f64 = 0.2;

/// Tracks a smoothed success/failure score per domain
///
/// Scores live in `[0.1, 1.0]`. Successes raise a score by 0.1, failures lower
/// it by 0.2, so a host has to answer twice to make up for each failure.
/// Unknown domains are treated as fully healthy.
#[derive(Debug, Clone, Default)]
pub struct DomainHealthTracker {
    scores: HashMap<String, f64>,
}

impl DomainHealthTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current score for a domain
    pub fn health(&self, domain: &str) -> f64 {
        self.scores.get(domain).copied().unwrap_or(MAX_HEALTH)
    }

    /// Records a successful fetch against a domain
    pub fn record_success(&mut self, domain: &str) -> f64 {
        let score = self
            .scores
            .entry(domain.to_string())
            .or_insert(MAX_HEALTH);
        *score = (*score + SUCCESS_STEP).min(MAX_HEALTH);
        *score
    }

    /// Records a failed fetch against a domain
    pub fn record_failure(&mut self, domain: &str) -> f64 {
        let score = self
            .scores
            .entry(domain.to_string())
            .or_insert(MAX_HEALTH);
        *score = (*score - FAILURE_STEP).max(MIN_HEALTH);
        tracing::trace!("Domain {} health dropped to {:.2}", domain, *score);
        *score
    }

    /// Number of domains with a recorded outcome
    pub fn tracked_domains(&self) -> usize {
        self.scores.len()
    }
}
