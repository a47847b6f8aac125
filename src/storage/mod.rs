//! Persistence of finished page records
//!
//! The crawler's only contract with storage is the [`PageStore`] trait:
//! upsert a page by URL hash and read back the last crawl time. The SQLite
//! backend also keeps session bookkeeping and answers the `--stats` report.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{PageStats, SqliteStorage};
pub use traits::{PageStore, StorageError, StorageResult};

use crate::extraction::StructuredMetadata;
use crate::quality::QualityMetrics;
use crate::state::PageStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Opens (or creates) the SQLite store at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A finished page handed to storage
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub url: String,
    pub url_hash: String,
    pub title: Option<String>,
    pub raw_text: String,
    pub structured_metadata: Option<StructuredMetadata>,
    pub content_hash: Option<String>,
    pub word_count: usize,
    pub depth: u32,
    pub quality: Option<QualityMetrics>,
    pub status: PageStatus,
    pub error_reason: Option<String>,
    pub crawled_at: DateTime<Utc>,

    // Enrichment
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
    pub sentiment: Option<f64>,
    pub reading_ease: Option<f64>,
    pub language: Option<String>,
    pub near_duplicate: bool,
}

impl PageRecord {
    /// Overall quality, if the page was scored
    pub fn overall_quality(&self) -> Option<f64> {
        self.quality.map(|q| q.overall)
    }
}

#[cfg(test)]
impl PageRecord {
    /// An unscored success record with only its identity filled in
    pub(crate) fn bare(url: &str, url_hash: &str, depth: u32) -> Self {
        Self {
            url: url.to_string(),
            url_hash: url_hash.to_string(),
            title: None,
            raw_text: String::new(),
            structured_metadata: None,
            content_hash: None,
            word_count: 0,
            depth,
            quality: None,
            status: PageStatus::Success,
            error_reason: None,
            crawled_at: Utc::now(),
            keywords: Vec::new(),
            topics: Vec::new(),
            sentiment: None,
            reading_ease: None,
            language: None,
            near_duplicate: false,
        }
    }
}

/// Lifecycle of a crawl session row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl SessionStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A stored crawl session
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: SessionStatus,
    pub succeeded: u64,
    pub failed: u64,
    pub filtered: u64,
    pub bytes_downloaded: u64,
}
