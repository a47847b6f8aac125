//! URL handling module for Quarry
//!
//! This module provides URL normalization, hashing, domain extraction, and the
//! scope checks (include/exclude patterns, same-site) applied to candidate links.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_domain, robots_url};
pub use matcher::{matches_wildcard, UrlFilter};
pub use normalize::{normalize_url, url_hash};

use url::Url;

/// Set of sites a session treats as internal
///
/// Built from the seed hosts; each seed host also admits its subdomains, so a
/// seed on `example.com` keeps `docs.example.com` in scope.
#[derive(Debug, Clone, Default)]
pub struct SiteScope {
    patterns: Vec<String>,
}

impl SiteScope {
    /// Builds the scope from seed URLs
    pub fn from_seeds(seeds: &[Url]) -> Self {
        let mut patterns: Vec<String> = seeds
            .iter()
            .filter_map(extract_domain)
            .map(|domain| format!("*.{}", domain))
            .collect();
        patterns.sort();
        patterns.dedup();
        Self { patterns }
    }

    /// Returns true if the domain belongs to one of the seed sites
    pub fn contains(&self, domain: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| matches_wildcard(pattern, domain))
    }

    /// Returns true if the URL's host belongs to one of the seed sites
    pub fn contains_url(&self, url: &Url) -> bool {
        extract_domain(url)
            .map(|domain| self.contains(&domain))
            .unwrap_or(false)
    }
}
