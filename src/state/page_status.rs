//! Outcome status carried by a page record
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final status of a processed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Fetched, extracted and scored
    Success,

    /// Fetch failed permanently or retries were exhausted
    Failed,

    /// Fetched, but rejected by the pipeline, quality gate or duplicate check
    Filtered,
}

impl PageStatus {
    /// Returns true if the record may be handed to storage
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Converts the status to its stored string form
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Filtered => "filtered",
        }
    }

    /// Parses a stored status string
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "filtered" => Some(Self::Filtered),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 3] {
        [Self::Success, Self::Failed, Self::Filtered]
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_success_is_emittable() {
        assert!(PageStatus::Success.is_success());
        assert!(!PageStatus::Failed.is_success());
        assert!(!PageStatus::Filtered.is_success());
    }

    #[test]
    fn test_db_strings() {
        assert_eq!(PageStatus::Filtered.to_db_string(), "filtered");
        assert_eq!(PageStatus::from_db_string("failed"), Some(PageStatus::Failed));
        assert_eq!(PageStatus::from_db_string("processed"), None);
        for status in PageStatus::all() {
            assert_eq!(PageStatus::from_db_string(status.to_db_string()), Some(status));
        }
    }

    #[test]
    fn test_serde_form_matches_db_form() {
        let json = serde_json::to_string(&PageStatus::Success).unwrap();
        assert_eq!(json, "\"success\"");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PageStatus::Failed), "failed");
    }
}
