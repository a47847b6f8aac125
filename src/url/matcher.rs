use crate::ConfigError;
use regex::Regex;

/// Checks if a host matches a site pattern
///
/// `"*.example.com"` matches the bare domain and any subdomain; a pattern without
/// the wildcard prefix matches only itself.
///
/// # Examples
///
/// ```
/// use quarry::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "docs.example.com"));
/// assert!(!matches_wildcard("*.example.com", "notexample.com"));
/// assert!(!matches_wildcard("example.com", "docs.example.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Compiled include/exclude patterns for candidate URLs
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl UrlFilter {
    /// Compiles the configured patterns
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    /// Returns true if the URL passes both pattern lists
    ///
    /// Exclusion wins over inclusion. An empty include list admits everything.
    pub fn allows(&self, url: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(url)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(url))
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p)
                .map_err(|e| ConfigError::InvalidPattern(format!("Invalid pattern '{}': {}", p, e)))
        })
        .collect()
}
