//! SQLite storage implementation
//!
//! `rusqlite::Connection` is not `Sync`, so it sits behind a mutex. Calls are
//! short and never held across an await point.

use crate::crawler::SessionSummary;
use crate::extraction::StructuredMetadata;
use crate::quality::QualityMetrics;
use crate::state::PageStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PageStore, StorageError, StorageResult};
use crate::storage::{PageRecord, SessionRecord, SessionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

/// A page as read back from the database
#[derive(Debug, Clone)]
pub struct StoredPage {
    pub url: String,
    pub title: Option<String>,
    pub status: PageStatus,
    pub word_count: i64,
    pub depth: u32,
    pub quality_overall: Option<f64>,

    /// Full quality breakdown, if the page was scored
    pub quality: Option<QualityMetrics>,

    pub structured_metadata: Option<StructuredMetadata>,
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
    pub language: Option<String>,
    pub near_duplicate: bool,
    pub crawled_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Aggregates for the `--stats` report
#[derive(Debug, Clone, Default)]
pub struct PageStats {
    pub total_pages: i64,
    pub by_status: HashMap<PageStatus, i64>,
    pub average_quality: Option<f64>,
    pub average_word_count: Option<f64>,
    pub near_duplicates: i64,
    pub top_topics: Vec<(String, usize)>,
    pub session_count: i64,
    pub last_session: Option<SessionRecord>,
}

const TOP_TOPICS: usize = 5;

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database or create the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates a throwaway in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
    }

    // ===== Sessions =====

    /// Records the start of a crawl session
    pub fn begin_session(&self, session_id: &str, config_hash: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO sessions (session_id, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                now,
                config_hash,
                SessionStatus::Running.to_db_string()
            ],
        )?;
        Ok(())
    }

    /// Stores the final counters and status of a session
    pub fn finish_session(&self, summary: &SessionSummary, status: SessionStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn()?.execute(
            "UPDATE sessions
             SET finished_at = ?1, status = ?2, succeeded = ?3, failed = ?4,
                 filtered = ?5, bytes_downloaded = ?6
             WHERE session_id = ?7",
            params![
                now,
                status.to_db_string(),
                summary.succeeded as i64,
                summary.failed as i64,
                summary.filtered as i64,
                summary.bytes_downloaded as i64,
                summary.session_id.to_string(),
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::SessionNotFound(summary.session_id.to_string()));
        }
        Ok(())
    }

    /// Gets a session by ID
    pub fn get_session(&self, session_id: &str) -> StorageResult<SessionRecord> {
        self.conn()?
            .query_row(
                "SELECT session_id, started_at, finished_at, config_hash, status,
                        succeeded, failed, filtered, bytes_downloaded
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                row_to_session,
            )
            .optional()?
            .ok_or_else(|| StorageError::SessionNotFound(session_id.to_string()))
    }

    /// The most recently started session, if any
    pub fn latest_session(&self) -> StorageResult<Option<SessionRecord>> {
        let session = self
            .conn()?
            .query_row(
                "SELECT session_id, started_at, finished_at, config_hash, status,
                        succeeded, failed, filtered, bytes_downloaded
                 FROM sessions ORDER BY started_at DESC LIMIT 1",
                [],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    // ===== Pages =====

    fn upsert_page_sync(
        &self,
        organization_id: &str,
        domain_id: &str,
        connector_id: &str,
        record: &PageRecord,
    ) -> StorageResult<()> {
        let metadata = record
            .structured_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let quality = record.quality.as_ref().map(serde_json::to_string).transpose()?;
        let keywords = serde_json::to_string(&record.keywords)?;
        let topics = serde_json::to_string(&record.topics)?;
        let now = Utc::now().to_rfc3339();

        self.conn()?.execute(
            "INSERT INTO pages (
                organization_id, domain_id, connector_id, url, url_hash, title, raw_text,
                structured_metadata, content_hash, word_count, depth, quality_metrics,
                quality_overall, status, error_reason, keywords, topics, sentiment,
                reading_ease, language, near_duplicate, crawled_at, created_at, updated_at
             ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?23
             )
             ON CONFLICT(url_hash, connector_id, organization_id) DO UPDATE SET
                domain_id = excluded.domain_id,
                url = excluded.url,
                title = excluded.title,
                raw_text = excluded.raw_text,
                structured_metadata = excluded.structured_metadata,
                content_hash = excluded.content_hash,
                word_count = excluded.word_count,
                depth = excluded.depth,
                quality_metrics = excluded.quality_metrics,
                quality_overall = excluded.quality_overall,
                status = excluded.status,
                error_reason = excluded.error_reason,
                keywords = excluded.keywords,
                topics = excluded.topics,
                sentiment = excluded.sentiment,
                reading_ease = excluded.reading_ease,
                language = excluded.language,
                near_duplicate = excluded.near_duplicate,
                crawled_at = excluded.crawled_at,
                updated_at = excluded.updated_at",
            params![
                organization_id,
                domain_id,
                connector_id,
                record.url,
                record.url_hash,
                record.title,
                record.raw_text,
                metadata,
                record.content_hash,
                record.word_count as i64,
                record.depth,
                quality,
                record.overall_quality(),
                record.status.to_db_string(),
                record.error_reason,
                keywords,
                topics,
                record.sentiment,
                record.reading_ease,
                record.language,
                record.near_duplicate,
                record.crawled_at.to_rfc3339(),
                now,
            ],
        )?;
        Ok(())
    }

    fn last_crawl_time_sync(&self, url_hash: &str) -> StorageResult<Option<DateTime<Utc>>> {
        let latest: Option<String> = self.conn()?.query_row(
            "SELECT MAX(crawled_at) FROM pages WHERE url_hash = ?1",
            params![url_hash],
            |row| row.get(0),
        )?;

        match latest {
            Some(ts) => DateTime::parse_from_rfc3339(&ts)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| StorageError::Database(format!("bad crawled_at '{}': {}", ts, e))),
            None => Ok(None),
        }
    }

    /// Reads back the stored page for a URL hash
    pub fn get_page(&self, url_hash: &str) -> StorageResult<Option<StoredPage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT url, title, status, word_count, depth, quality_overall, keywords, topics,
                    language, near_duplicate, crawled_at, created_at, updated_at,
                    quality_metrics, structured_metadata
             FROM pages WHERE url_hash = ?1
             ORDER BY updated_at DESC LIMIT 1",
        )?;

        let page = stmt
            .query_row(params![url_hash], |row| {
                let status: String = row.get(2)?;
                let keywords: String = row.get(6)?;
                let topics: String = row.get(7)?;
                let quality: Option<String> = row.get(13)?;
                let metadata: Option<String> = row.get(14)?;
                Ok(StoredPage {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    status: PageStatus::from_db_string(&status).unwrap_or(PageStatus::Failed),
                    word_count: row.get(3)?,
                    depth: row.get(4)?,
                    quality_overall: row.get(5)?,
                    quality: quality.and_then(|json| serde_json::from_str(&json).ok()),
                    structured_metadata: metadata.and_then(|json| serde_json::from_str(&json).ok()),
                    keywords: serde_json::from_str(&keywords).unwrap_or_default(),
                    topics: serde_json::from_str(&topics).unwrap_or_default(),
                    language: row.get(8)?,
                    near_duplicate: row.get(9)?,
                    crawled_at: row.get(10)?,
                    created_at: row.get(11)?,
                    updated_at: row.get(12)?,
                })
            })
            .optional()?;
        Ok(page)
    }

    /// Total number of stored pages
    pub fn count_pages(&self) -> StorageResult<i64> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Number of stored pages per status
    pub fn count_by_status(&self) -> StorageResult<HashMap<PageStatus, i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM pages GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = PageStatus::from_db_string(&status) {
                counts.insert(status, count);
            }
        }
        Ok(counts)
    }

    /// Aggregates everything the `--stats` report prints
    pub fn page_stats(&self) -> StorageResult<PageStats> {
        let total_pages = self.count_pages()?;
        let by_status = self.count_by_status()?;
        let last_session = self.latest_session()?;

        let conn = self.conn()?;
        let (average_quality, average_word_count, near_duplicates): (Option<f64>, Option<f64>, i64) =
            conn.query_row(
                "SELECT AVG(quality_overall), AVG(word_count), COALESCE(SUM(near_duplicate), 0)
                 FROM pages",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
        let session_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;

        let mut topic_counts: HashMap<String, usize> = HashMap::new();
        let mut stmt = conn.prepare("SELECT topics FROM pages")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            let topics: Vec<String> = serde_json::from_str(&row?)?;
            for topic in topics {
                *topic_counts.entry(topic).or_insert(0) += 1;
            }
        }
        let mut top_topics: Vec<(String, usize)> = topic_counts.into_iter().collect();
        top_topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_topics.truncate(TOP_TOPICS);

        Ok(PageStats {
            total_pages,
            by_status,
            average_quality,
            average_word_count,
            near_duplicates,
            top_topics,
            session_count,
            last_session,
        })
    }
}

#[async_trait]
impl PageStore for SqliteStorage {
    async fn upsert_page(
        &self,
        organization_id: &str,
        domain_id: &str,
        connector_id: &str,
        record: &PageRecord,
    ) -> StorageResult<()> {
        self.upsert_page_sync(organization_id, domain_id, connector_id, record)
    }

    async fn last_crawl_time(&self, url_hash: &str) -> StorageResult<Option<DateTime<Utc>>> {
        self.last_crawl_time_sync(url_hash)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let status: String = row.get(4)?;
    Ok(SessionRecord {
        session_id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: SessionStatus::from_db_string(&status).unwrap_or(SessionStatus::Running),
        succeeded: row.get::<_, i64>(5)? as u64,
        failed: row.get::<_, i64>(6)? as u64,
        filtered: row.get::<_, i64>(7)? as u64,
        bytes_downloaded: row.get::<_, i64>(8)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityMetrics;
    use chrono::Duration;

    fn record(url_hash: &str, title: &str, overall: f64) -> PageRecord {
        let mut record = PageRecord::bare("https://example.com/a", url_hash, 1);
        record.title = Some(title.to_string());
        record.raw_text = "Some stored text".to_string();
        record.word_count = 3;
        record.quality = Some(QualityMetrics {
            overall,
            ..QualityMetrics::default()
        });
        record.keywords = vec!["stored".to_string()];
        record.topics = vec!["technology".to_string()];
        record
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::new_in_memory().is_ok());
    }

    #[test]
    fn test_create_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pages.db");
        assert!(SqliteStorage::new(&path).is_ok());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates_in_place() {
        let storage = SqliteStorage::new_in_memory().unwrap();

        storage
            .upsert_page("org", "dom", "conn", &record("h1", "First", 0.4))
            .await
            .unwrap();
        let first = storage.get_page("h1").unwrap().unwrap();

        storage
            .upsert_page("org", "dom", "conn", &record("h1", "Second", 0.7))
            .await
            .unwrap();

        assert_eq!(storage.count_pages().unwrap(), 1);
        let page = storage.get_page("h1").unwrap().unwrap();
        assert_eq!(page.title.as_deref(), Some("Second"));
        assert_eq!(page.quality_overall, Some(0.7));
        assert_eq!(page.created_at, first.created_at);
        assert_eq!(page.keywords, vec!["stored".to_string()]);
    }

    #[tokio::test]
    async fn test_same_hash_different_connector_is_separate_row() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_page("org", "dom", "conn-a", &record("h1", "A", 0.5))
            .await
            .unwrap();
        storage
            .upsert_page("org", "dom", "conn-b", &record("h1", "B", 0.5))
            .await
            .unwrap();
        storage
            .upsert_page("org-2", "dom", "conn-a", &record("h1", "C", 0.5))
            .await
            .unwrap();
        assert_eq!(storage.count_pages().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_last_crawl_time() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.last_crawl_time("h1").await.unwrap().is_none());

        let mut page = record("h1", "A", 0.5);
        page.crawled_at = Utc::now() - Duration::hours(3);
        storage.upsert_page("org", "dom", "conn", &page).await.unwrap();

        let last = storage.last_crawl_time("h1").await.unwrap().unwrap();
        assert_eq!(last.timestamp(), page.crawled_at.timestamp());
    }

    #[test]
    fn test_session_lifecycle() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let summary = SessionSummary {
            succeeded: 4,
            failed: 1,
            bytes_downloaded: 2048,
            ..SessionSummary::default()
        };
        let id = summary.session_id.to_string();

        storage.begin_session(&id, "cafebabe").unwrap();
        assert_eq!(
            storage.get_session(&id).unwrap().status,
            SessionStatus::Running
        );

        storage
            .finish_session(&summary, SessionStatus::Completed)
            .unwrap();
        let session = storage.get_session(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.succeeded, 4);
        assert_eq!(session.failed, 1);
        assert_eq!(session.bytes_downloaded, 2048);
        assert!(session.finished_at.is_some());
        assert_eq!(session.config_hash, "cafebabe");
    }

    #[test]
    fn test_finish_unknown_session() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.finish_session(&SessionSummary::default(), SessionStatus::Completed);
        assert!(matches!(result, Err(StorageError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_page_stats() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_page("org", "dom", "conn", &record("h1", "A", 0.4))
            .await
            .unwrap();
        let mut near = record("h2", "B", 0.6);
        near.near_duplicate = true;
        storage.upsert_page("org", "dom", "conn", &near).await.unwrap();

        let stats = storage.page_stats().unwrap();
        assert_eq!(stats.total_pages, 2);
        assert_eq!(stats.by_status.get(&PageStatus::Success), Some(&2));
        assert!((stats.average_quality.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(stats.near_duplicates, 1);
        assert_eq!(stats.top_topics, vec![("technology".to_string(), 2)]);
        assert_eq!(stats.session_count, 0);
        assert!(stats.last_session.is_none());
    }
}
