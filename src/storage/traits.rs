//! Storage contract and error types

use crate::storage::PageRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Where finished page records go
///
/// Any error returned here is fatal to the crawl session.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Inserts a page, or updates it in place if the same URL hash was
    /// already stored for this organization and connector
    ///
    /// # Arguments
    ///
    /// * `organization_id` - Tenant the page belongs to
    /// * `domain_id` - Logical domain grouping inside the tenant
    /// * `connector_id` - Connector that produced the crawl
    /// * `record` - The finished page
    async fn upsert_page(
        &self,
        organization_id: &str,
        domain_id: &str,
        connector_id: &str,
        record: &PageRecord,
    ) -> StorageResult<()>;

    /// When the URL with this hash was last crawled, if ever
    async fn last_crawl_time(&self, url_hash: &str) -> StorageResult<Option<DateTime<Utc>>>;
}
