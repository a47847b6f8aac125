//! Statistics report over the stored pages

use crate::state::PageStatus;
use crate::storage::PageStats;

/// Renders stored-page statistics as plain text
///
/// # Arguments
///
/// * `stats` - Aggregates loaded with `SqliteStorage::page_stats`
pub fn format_statistics(stats: &PageStats) -> String {
    let mut out = String::new();

    out.push_str("=== Stored Page Statistics ===\n\n");
    out.push_str("Overview:\n");
    out.push_str(&format!("  Total pages: {}\n", stats.total_pages));
    out.push_str(&format!("  Sessions recorded: {}\n", stats.session_count));
    if let Some(quality) = stats.average_quality {
        out.push_str(&format!("  Average quality: {:.3}\n", quality));
    }
    if let Some(words) = stats.average_word_count {
        out.push_str(&format!("  Average word count: {:.0}\n", words));
    }
    out.push_str(&format!("  Near-duplicates: {}\n\n", stats.near_duplicates));

    out.push_str("Pages by Status:\n");
    for status in PageStatus::all() {
        let count = stats.by_status.get(&status).copied().unwrap_or(0);
        let percentage = if stats.total_pages > 0 {
            (count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        out.push_str(&format!("  {}: {} ({:.1}%)\n", status, count, percentage));
    }
    out.push('\n');

    if !stats.top_topics.is_empty() {
        out.push_str("Top Topics:\n");
        for (topic, count) in &stats.top_topics {
            out.push_str(&format!("  {}: {}\n", topic, count));
        }
        out.push('\n');
    }

    if let Some(session) = &stats.last_session {
        out.push_str("Last Session:\n");
        out.push_str(&format!("  ID: {}\n", session.session_id));
        out.push_str(&format!("  Started: {}\n", session.started_at));
        if let Some(finished) = &session.finished_at {
            out.push_str(&format!("  Finished: {}\n", finished));
        }
        out.push_str(&format!("  Status: {}\n", session.status.to_db_string()));
        out.push_str(&format!(
            "  Stored {} / failed {} / filtered {}\n",
            session.succeeded, session.failed, session.filtered
        ));
    }

    out
}

/// Prints stored-page statistics to stdout
pub fn print_statistics(stats: &PageStats) {
    print!("{}", format_statistics(stats));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SessionRecord, SessionStatus};

    #[test]
    fn test_format_statistics() {
        let mut stats = PageStats {
            total_pages: 4,
            average_quality: Some(0.55),
            near_duplicates: 1,
            top_topics: vec![("technology".to_string(), 3)],
            session_count: 1,
            ..PageStats::default()
        };
        stats.by_status.insert(PageStatus::Success, 4);
        stats.last_session = Some(SessionRecord {
            session_id: "abc".to_string(),
            started_at: "2024-01-01T00:00:00+00:00".to_string(),
            finished_at: None,
            config_hash: "ff".to_string(),
            status: SessionStatus::Interrupted,
            succeeded: 4,
            failed: 0,
            filtered: 2,
            bytes_downloaded: 0,
        });

        let text = format_statistics(&stats);
        assert!(text.contains("Total pages: 4"));
        assert!(text.contains("Average quality: 0.550"));
        assert!(text.contains("success: 4 (100.0%)"));
        assert!(text.contains("failed: 0 (0.0%)"));
        assert!(text.contains("technology: 3"));
        assert!(text.contains("Status: interrupted"));
    }

    #[test]
    fn test_empty_database() {
        let text = format_statistics(&PageStats::default());
        assert!(text.contains("Total pages: 0"));
        assert!(!text.contains("Top Topics"));
        assert!(!text.contains("Last Session"));
    }
}
