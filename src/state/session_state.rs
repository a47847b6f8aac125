use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Number of recent response times used for the adaptive delay
pub const RESPONSE_WINDOW: usize = 10;

/// Pages that must be processed before an ETA is offered
pub const ETA_MIN_PAGES: u64 = 5;

/// Hard ceiling on the adaptive delay for slow hosts
pub const MAX_ADAPTIVE_DELAY: Duration = Duration::from_secs(10);

/// Response time at which the configured delay is used unchanged
const REFERENCE_RESPONSE_SECS: f64 = 2.0;

/// Live metrics for one crawl session
///
/// Mutated once per processed URL by the session loop; everything else only
/// reads it.
#[derive(Debug, Clone)]
pub struct CrawlSessionState {
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,

    /// URLs admitted to the frontier, seeds included
    pub discovered: u64,

    /// URLs taken off the frontier and handled, whatever the outcome
    pub processed: u64,

    pub succeeded: u64,
    pub failed: u64,
    pub filtered: u64,

    /// URLs dropped before fetching (robots, patterns, depth, recrawl window)
    pub skipped: u64,

    pub bytes_downloaded: u64,

    /// Mean over the recent response window
    pub avg_response_time: Duration,

    pub queue_size: usize,
    pub estimated_completion: Option<DateTime<Utc>>,

    started: Instant,
    response_times: VecDeque<Duration>,
}

impl CrawlSessionState {
    /// Starts a new session clock
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            start_time: Utc::now(),
            discovered: 0,
            processed: 0,
            succeeded: 0,
            failed: 0,
            filtered: 0,
            skipped: 0,
            bytes_downloaded: 0,
            avg_response_time: Duration::ZERO,
            queue_size: 0,
            estimated_completion: None,
            started: Instant::now(),
            response_times: VecDeque::with_capacity(RESPONSE_WINDOW),
        }
    }

    /// Time since the session started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Records the duration and size of a completed HTTP exchange
    pub fn record_response(&mut self, duration: Duration, bytes: u64) {
        if self.response_times.len() == RESPONSE_WINDOW {
            self.response_times.pop_front();
        }
        self.response_times.push_back(duration);
        self.bytes_downloaded += bytes;

        let total: Duration = self.response_times.iter().sum();
        self.avg_response_time = total / self.response_times.len() as u32;
    }

    /// Updates processed count, queue size and the completion estimate
    pub fn finish_page(&mut self, queue_size: usize, max_pages: u64) {
        self.processed += 1;
        self.queue_size = queue_size;
        self.estimated_completion = self.estimate_completion(max_pages);
    }

    /// Pages processed per second of wall time
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.processed as f64 / secs
    }

    /// Share of processed URLs that failed
    pub fn error_rate(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.failed as f64 / self.processed as f64
    }

    /// Time left, extrapolated from the mean time per page so far
    ///
    /// `None` until enough pages have been processed for the mean to mean
    /// anything.
    pub fn remaining_time(&self, max_pages: u64) -> Option<Duration> {
        if self.processed < ETA_MIN_PAGES {
            return None;
        }
        let per_page = self.elapsed().as_secs_f64() / self.processed as f64;
        let budget_left = max_pages.saturating_sub(self.processed);
        let remaining = (self.queue_size as u64).min(budget_left);
        Some(Duration::from_secs_f64(per_page * remaining as f64))
    }

    fn estimate_completion(&self, max_pages: u64) -> Option<DateTime<Utc>> {
        let remaining = self.remaining_time(max_pages)?;
        let remaining = chrono::Duration::from_std(remaining).ok()?;
        Some(Utc::now() + remaining)
    }

    /// Computes the pause before the next page from recent response times
    ///
    /// The configured delay is scaled by how the recent mean response time
    /// compares to a two second reference: fast hosts go down to half the
    /// delay, slow hosts up to twice the delay, never above ten seconds.
    pub fn adaptive_delay(&self, configured: Duration) -> Duration {
        if self.response_times.is_empty() {
            return configured.min(MAX_ADAPTIVE_DELAY);
        }
        let factor = (self.avg_response_time.as_secs_f64() / REFERENCE_RESPONSE_SECS).clamp(0.5, 2.0);
        let base = configured.as_secs_f64();
        let floor = base * 0.5;
        let scaled = (base * factor).max(floor).min(MAX_ADAPTIVE_DELAY.as_secs_f64());
        Duration::from_secs_f64(scaled)
    }
}

impl Default for CrawlSessionState {
    fn default() -> Self {
        Self::new()
    }
}
