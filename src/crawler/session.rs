//! Crawl session loop
//!
//! One session owns its frontier, retry engine, robots cache, scorer and
//! telemetry. URLs are processed one at a time; the only suspension points are
//! network fetches and the politeness sleep between pages.

use crate::config::Config;
use crate::crawler::{
    FetchError, FetchRetryEngine, Frontier, FrontierEntry, HttpFetch, HttpResponse, RetryError,
    UrlDiscoveryRanker, UrlQueueManager,
};
use crate::extraction::{
    ContentExtractionPipeline, DocumentKind, ExtractedLink, PipelineOutcome, PipelineOutput,
};
use crate::quality::QualityScorer;
use crate::robots::RobotsCache;
use crate::state::{CrawlSessionState, PageStatus};
use crate::storage::{PageRecord, PageStore};
use crate::url::{extract_domain, normalize_url, url_hash, SiteScope, UrlFilter};
use crate::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Priority given to seed URLs
const SEED_PRIORITY: f64 = 1.0;

/// Pages between progress log lines
const PROGRESS_INTERVAL: u64 = 10;

/// Poll interval when every queued domain is still inside its pacing window
const PACING_POLL: Duration = Duration::from_millis(50);

/// Final counters of a finished (or interrupted) session
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub discovered: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub filtered: u64,
    pub skipped: u64,
    pub bytes_downloaded: u64,
    pub duration: Duration,
    pub pages_per_second: f64,
    pub error_rate: f64,

    /// URLs whose circuit was still open when the session ended
    pub open_circuits: usize,

    /// Stopped by the stop flag rather than by running out of work
    pub interrupted: bool,
}

impl SessionSummary {
    fn from_state(state: &CrawlSessionState, open_circuits: usize, interrupted: bool) -> Self {
        Self {
            session_id: state.session_id,
            discovered: state.discovered,
            processed: state.processed,
            succeeded: state.succeeded,
            failed: state.failed,
            filtered: state.filtered,
            skipped: state.skipped,
            bytes_downloaded: state.bytes_downloaded,
            duration: state.elapsed(),
            pages_per_second: state.pages_per_second(),
            error_rate: state.error_rate(),
            open_circuits,
            interrupted,
        }
    }
}

/// What happened to a dequeued URL
enum PageOutcome {
    /// Dropped before any page request was sent
    Skipped,

    /// A fetch was attempted; carries the domain's robots crawl-delay
    Processed { crawl_delay: Option<Duration> },
}

/// A single crawl session
///
/// Generic over the network capability, the storage collaborator and the
/// frontier so each can be swapped in tests.
pub struct CrawlSession<F, S, Q = UrlQueueManager>
where
    F: HttpFetch,
    S: PageStore,
    Q: Frontier,
{
    config: Config,
    seeds: Vec<Url>,
    fetcher: F,
    store: Arc<S>,
    queue: Q,
    retry: FetchRetryEngine,
    robots: RobotsCache,
    scorer: QualityScorer,
    pipeline: ContentExtractionPipeline,
    ranker: UrlDiscoveryRanker,
    filter: UrlFilter,
    scope: SiteScope,
    state: CrawlSessionState,
    stop: Arc<AtomicBool>,
}

impl<F, S> CrawlSession<F, S, UrlQueueManager>
where
    F: HttpFetch,
    S: PageStore,
{
    /// Creates a session with the default in-memory frontier
    pub fn new(config: Config, fetcher: F, store: Arc<S>) -> Result<Self> {
        let queue = UrlQueueManager::from_config(&config);
        Self::with_frontier(config, fetcher, store, queue)
    }
}

impl<F, S, Q> CrawlSession<F, S, Q>
where
    F: HttpFetch,
    S: PageStore,
    Q: Frontier,
{
    /// Creates a session around a caller-supplied frontier
    ///
    /// Seeds are normalized here, so an unparseable seed fails before any
    /// network activity.
    pub fn with_frontier(config: Config, fetcher: F, store: Arc<S>, queue: Q) -> Result<Self> {
        let seeds = config
            .seeds
            .iter()
            .map(|seed| normalize_url(seed))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let filter = UrlFilter::new(
            &config.crawler.include_patterns,
            &config.crawler.exclude_patterns,
        )?;

        Ok(Self {
            scope: SiteScope::from_seeds(&seeds),
            seeds,
            retry: FetchRetryEngine::from_config(&config),
            robots: RobotsCache::new(&config.crawler.user_agent),
            scorer: QualityScorer::default(),
            pipeline: ContentExtractionPipeline::new(&config.pipeline),
            ranker: UrlDiscoveryRanker::new(),
            state: CrawlSessionState::new(),
            stop: Arc::new(AtomicBool::new(false)),
            filter,
            fetcher,
            store,
            queue,
            config,
        })
    }

    /// Flag that stops the session before its next page when set
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state(&self) -> &CrawlSessionState {
        &self.state
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn retry_engine(&self) -> &FetchRetryEngine {
        &self.retry
    }

    /// Counters as they stand now
    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_state(
            &self.state,
            self.retry.breaker().open_circuits(std::time::Instant::now()),
            self.stop.load(Ordering::SeqCst),
        )
    }

    /// Runs the session until the frontier drains, the page budget is spent
    /// or the stop flag is set
    ///
    /// # Returns
    ///
    /// * `Ok(SessionSummary)` - Final counters; per-page failures are counted,
    ///   not returned
    /// * `Err(QuarryError::Storage)` - The storage collaborator failed; the
    ///   session stops at once
    pub async fn run(&mut self) -> Result<SessionSummary> {
        let max_pages = u64::from(self.config.crawler.max_pages);
        let configured_delay = Duration::from_millis(self.config.crawler.delay_ms);

        tracing::info!(
            "Starting session {} with {} seeds",
            self.state.session_id,
            self.seeds.len()
        );

        for seed in self.seeds.clone() {
            if self.queue.add(seed, SEED_PRIORITY, 0) {
                self.state.discovered += 1;
            }
        }

        loop {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!("Stop requested, ending session");
                break;
            }
            if self.state.processed >= max_pages {
                tracing::info!("Reached page budget of {}", max_pages);
                break;
            }

            self.queue.promote_retries();

            let entry = match self.queue.next() {
                Some(entry) => entry,
                None if self.queue.is_empty() => {
                    tracing::info!("Frontier is empty, session complete");
                    break;
                }
                None => {
                    let wait = self.queue.time_until_ready().unwrap_or(PACING_POLL);
                    tracing::trace!("All queued domains pacing, waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            let crawl_delay = match self.process(entry).await? {
                PageOutcome::Skipped => continue,
                PageOutcome::Processed { crawl_delay } => crawl_delay,
            };

            self.state.finish_page(self.queue.len(), max_pages);
            if self.state.processed % PROGRESS_INTERVAL == 0 {
                self.log_progress(max_pages);
            }

            let mut delay = self.state.adaptive_delay(configured_delay);
            if let Some(robots_delay) = crawl_delay {
                delay = delay.max(robots_delay);
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let summary = self.summary();
        tracing::info!(
            "Session {} finished: {} processed, {} succeeded, {} failed, {} filtered, {} skipped in {:?}",
            summary.session_id,
            summary.processed,
            summary.succeeded,
            summary.failed,
            summary.filtered,
            summary.skipped,
            summary.duration
        );
        Ok(summary)
    }

    /// Handles one dequeued URL
    async fn process(&mut self, entry: FrontierEntry) -> Result<PageOutcome> {
        let url_str = entry.url.as_str().to_string();
        let domain = extract_domain(&entry.url).unwrap_or_default();
        let hash = url_hash(&entry.url);

        if let Some(reason) = self.skip_reason(&entry) {
            tracing::debug!("Skipping {}: {}", url_str, reason);
            self.state.skipped += 1;
            return Ok(PageOutcome::Skipped);
        }

        if self.config.crawler.recrawl_interval_hours > 0 {
            if let Some(last) = self.store.last_crawl_time(&hash).await? {
                let interval =
                    chrono::Duration::hours(self.config.crawler.recrawl_interval_hours as i64);
                if Utc::now() - last < interval {
                    tracing::debug!("Skipping {}: crawled at {}", url_str, last);
                    self.state.skipped += 1;
                    return Ok(PageOutcome::Skipped);
                }
            }
        }

        let mut crawl_delay = None;
        if self.config.crawler.respect_robots {
            let check = self.robots.check(&self.fetcher, &entry.url).await;
            if !check.allowed {
                tracing::debug!("Skipping {}: disallowed by robots.txt", url_str);
                self.state.skipped += 1;
                return Ok(PageOutcome::Skipped);
            }
            crawl_delay = check.crawl_delay;
        }

        let fetcher = &self.fetcher;
        let target = url_str.as_str();
        let fetched = self
            .retry
            .execute(target, &domain, move || async move {
                fetcher
                    .fetch(target)
                    .await
                    .and_then(|response| classify_document(target, response))
            })
            .await;

        let (response, kind) = match fetched {
            Ok(found) => found,
            Err(e) => {
                self.handle_fetch_failure(entry, e);
                return Ok(PageOutcome::Processed { crawl_delay });
            }
        };

        self.state
            .record_response(response.elapsed, response.bytes());

        let page_url = Url::parse(&response.final_url).unwrap_or_else(|_| entry.url.clone());
        let output = self
            .pipeline
            .run(&page_url, &response.body, kind, &mut self.scorer);

        self.handle_output(&entry, &hash, output).await?;
        Ok(PageOutcome::Processed { crawl_delay })
    }

    /// Reasons a URL is dropped before any request is made
    fn skip_reason(&self, entry: &FrontierEntry) -> Option<&'static str> {
        if entry.depth > self.config.crawler.max_depth {
            return Some("beyond max depth");
        }
        if !self.filter.allows(entry.url.as_str()) {
            return Some("excluded by URL patterns");
        }
        if !self.config.crawler.follow_external && !self.scope.contains_url(&entry.url) {
            return Some("outside seed sites");
        }
        None
    }

    fn handle_fetch_failure(&mut self, entry: FrontierEntry, error: RetryError) {
        self.state.failed += 1;

        if !error.is_retryable() {
            tracing::debug!("Failed {}: {}", entry.url, error.reason());
            return;
        }

        self.queue.mark_failed(&entry.url);
        let url = entry.url.clone();
        if self.queue.park_for_retry(entry) {
            tracing::debug!("Failed {} ({}), parked for retry", url, error.reason());
        } else {
            tracing::warn!("Giving up on {}: {}", url, error);
        }
    }

    /// Gates a pipeline result, emits it if it qualifies, and feeds discovery
    async fn handle_output(
        &mut self,
        entry: &FrontierEntry,
        hash: &str,
        output: PipelineOutput,
    ) -> Result<()> {
        let PipelineOutput {
            content,
            quality,
            outcome,
            ..
        } = output;
        let metrics = quality.metrics;

        let enrichment = match outcome {
            PipelineOutcome::Filtered(rejection) => {
                tracing::debug!("Filtered {}: {}", entry.url, rejection);
                self.state.filtered += 1;
                return Ok(());
            }
            PipelineOutcome::Accepted(enrichment) => enrichment,
        };

        if metrics.is_exact_duplicate() {
            tracing::debug!("Filtered {}: exact duplicate content", entry.url);
            self.state.filtered += 1;
            return Ok(());
        }

        // Low-scoring pages still contribute links, at reduced priority
        self.enqueue_links(&content.links, metrics.overall, entry.depth);

        if metrics.overall < self.config.crawler.quality_threshold {
            tracing::debug!(
                "Filtered {}: quality {:.3} below threshold {:.3}",
                entry.url,
                metrics.overall,
                self.config.crawler.quality_threshold
            );
            self.state.filtered += 1;
            return Ok(());
        }

        let near_duplicate = metrics.is_near_duplicate(self.config.crawler.duplicate_threshold);
        let language = content.language();
        let record = PageRecord {
            url: entry.url.to_string(),
            url_hash: hash.to_string(),
            title: content.title,
            raw_text: content.text,
            structured_metadata: Some(content.metadata),
            content_hash: Some(quality.content_hash),
            word_count: content.word_count,
            depth: entry.depth,
            quality: Some(metrics),
            status: PageStatus::Success,
            error_reason: None,
            crawled_at: Utc::now(),
            keywords: enrichment.keywords,
            topics: enrichment.topics,
            sentiment: enrichment.sentiment,
            reading_ease: enrichment.reading_ease,
            language,
            near_duplicate,
        };

        let tenant = &self.config.tenant;
        self.store
            .upsert_page(
                &tenant.organization_id,
                &tenant.domain_id,
                &tenant.connector_id,
                &record,
            )
            .await?;

        self.state.succeeded += 1;
        tracing::debug!(
            "Stored {} (quality {:.3}, {} words)",
            record.url,
            metrics.overall,
            record.word_count
        );
        Ok(())
    }

    /// Ranks a page's links and pushes the admissible ones into the frontier
    fn enqueue_links(&mut self, links: &[ExtractedLink], parent_quality: f64, parent_depth: u32) {
        if parent_depth >= self.config.crawler.max_depth {
            return;
        }

        let candidates: Vec<(Url, &str)> = links
            .iter()
            .filter_map(|link| match normalize_url(link.url.as_str()) {
                Ok(url) => Some((url, link.anchor_text.as_str())),
                Err(e) => {
                    tracing::trace!("Dropping link {}: {}", link.url, e);
                    None
                }
            })
            .filter(|(url, _)| self.filter.allows(url.as_str()))
            .filter(|(url, _)| self.config.crawler.follow_external || self.scope.contains_url(url))
            .collect();

        let ranked = self.ranker.rank(
            candidates.iter().map(|(url, anchor)| (url, *anchor)),
            parent_quality,
            parent_depth,
        );

        let mut added = 0;
        for link in ranked {
            if self.queue.add(link.url, link.priority, link.depth) {
                added += 1;
            }
        }
        self.state.discovered += added;
        tracing::trace!("Queued {} of {} links", added, candidates.len());
    }

    fn log_progress(&self, max_pages: u64) {
        tracing::info!(
            "Progress: {} processed ({} ok, {} failed, {} filtered), {} queued, {:.2} pages/sec, {} remaining",
            self.state.processed,
            self.state.succeeded,
            self.state.failed,
            self.state.filtered,
            self.state.queue_size,
            self.state.pages_per_second(),
            self.state
                .remaining_time(max_pages)
                .map(|d| format!("~{}s", d.as_secs()))
                .unwrap_or_else(|| "unknown".to_string())
        );
    }
}

/// Accepts HTML and plain-text bodies, rejecting everything else permanently
fn classify_document(
    url: &str,
    response: HttpResponse,
) -> std::result::Result<(HttpResponse, DocumentKind), FetchError> {
    match DocumentKind::from_content_type(response.content_type.as_deref()) {
        Some(kind) => Ok((response, kind)),
        None => Err(FetchError::UnsupportedContentType {
            url: url.to_string(),
            content_type: response.content_type.unwrap_or_default(),
        }),
    }
}
