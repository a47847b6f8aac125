//! URL frontier with priority tiers and per-domain pacing
//!
//! This module handles:
//! - Three priority tiers (high, medium, low), each a max-heap
//! - The visited set that keeps a URL from being enqueued twice
//! - Per-domain minimum delay between dequeues
//! - Failure history and retry eligibility per URL

use crate::config::Config;
use crate::url::extract_domain;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};
use url::Url;

/// Adjusted priority at or above which an entry lands in the high tier
pub const HIGH_PRIORITY: f64 = 0.8;

/// Adjusted priority at or above which an entry lands in the medium tier
pub const MEDIUM_PRIORITY: f64 = 0.5;

/// Per-level decay applied to a link's priority
pub const DEPTH_DECAY: f64 = 0.9;

/// Unit the exponential retry backoff is expressed in
pub const RETRY_UNIT: Duration = Duration::from_secs(60);

/// A URL waiting in the frontier
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: Url,

    /// Priority after depth decay, in `[0, 1]`
    pub priority: f64,

    pub depth: u32,
    pub discovered_at: DateTime<Utc>,

    /// Insertion sequence, used to keep equal priorities FIFO
    seq: u64,
}

// Higher priority pops first; for equal priority the earlier insertion wins
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

/// Priority tier of a frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn for_priority(priority: f64) -> Self {
        if priority >= HIGH_PRIORITY {
            Self::High
        } else if priority >= MEDIUM_PRIORITY {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn index(self) -> usize {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

/// Pacing state for one domain
#[derive(Debug, Clone)]
pub struct DomainRateState {
    pub last_access: Option<Instant>,
    pub min_delay: Duration,
}

impl DomainRateState {
    fn new(min_delay: Duration) -> Self {
        Self {
            last_access: None,
            min_delay,
        }
    }

    /// Returns true if the domain was accessed less than `min_delay` ago
    pub fn is_limited(&self, now: Instant) -> bool {
        self.time_until_ready(now).is_some()
    }

    /// Time until the domain may be accessed again, `None` if it already may
    pub fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        let last = self.last_access?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.min_delay {
            Some(self.min_delay - elapsed)
        } else {
            None
        }
    }
}

/// Operations a crawl session needs from its frontier
///
/// `CrawlSession` is written against this trait so an alternative frontier (for
/// example one shared by several fetch workers behind a lock) can be dropped in
/// without touching the session loop. Per-domain pacing is the frontier's job
/// whatever the implementation.
pub trait Frontier: Send {
    /// Enqueues a URL; false if it was already queued or visited
    ///
    /// A URL whose domain is inside its pacing window is still accepted and
    /// held back by `next` until the window passes.
    fn add(&mut self, url: Url, priority: f64, depth: u32) -> bool;

    /// Pops the best URL whose domain may be accessed now
    fn next(&mut self) -> Option<FrontierEntry>;

    /// Records a failed attempt at a URL
    fn mark_failed(&mut self, url: &Url);

    /// Returns true if the URL may be attempted again now
    fn can_retry(&self, url: &Url) -> bool;

    /// Holds a failed entry until it becomes eligible for another attempt
    fn park_for_retry(&mut self, entry: FrontierEntry) -> bool;

    /// Moves parked entries that are now eligible back into the tiers
    fn promote_retries(&mut self) -> usize;

    /// How long until some queued domain may be accessed, `None` if one may now
    fn time_until_ready(&self) -> Option<Duration>;

    /// Number of queued entries, parked retries excluded
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The default in-memory frontier
#[derive(Debug)]
pub struct UrlQueueManager {
    tiers: [BinaryHeap<FrontierEntry>; 3],
    queued: HashSet<String>,
    visited: HashSet<String>,
    domains: HashMap<String, DomainRateState>,
    failures: HashMap<String, Vec<Instant>>,
    parked: Vec<FrontierEntry>,
    min_delay: Duration,
    max_retries: u32,
    retry_delay_base: f64,
    retry_unit: Duration,
    next_seq: u64,
}

impl UrlQueueManager {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `min_delay` - Minimum time between two dequeues for the same domain
    /// * `max_retries` - Failures after which a URL is never retried
    /// * `retry_delay_base` - Base of the exponential retry backoff
    pub fn new(min_delay: Duration, max_retries: u32, retry_delay_base: f64) -> Self {
        Self {
            tiers: [BinaryHeap::new(), BinaryHeap::new(), BinaryHeap::new()],
            queued: HashSet::new(),
            visited: HashSet::new(),
            domains: HashMap::new(),
            failures: HashMap::new(),
            parked: Vec::new(),
            min_delay,
            max_retries,
            retry_delay_base,
            retry_unit: RETRY_UNIT,
            next_seq: 0,
        }
    }

    /// Creates a frontier from the `[queue]`, `[crawler]` and `[retry]` sections
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_millis(config.queue.domain_min_delay_ms),
            config.crawler.max_retries,
            config.retry.retry_delay_base,
        )
    }

    /// Overrides the retry backoff unit (60 seconds by default)
    pub fn with_retry_unit(mut self, unit: Duration) -> Self {
        self.retry_unit = unit;
        self
    }

    /// `add` against an explicit clock
    pub fn add_at(&mut self, url: Url, priority: f64, depth: u32, now: Instant) -> bool {
        let key = url.as_str().to_string();
        if self.queued.contains(&key) || self.visited.contains(&key) {
            tracing::trace!("Already seen: {}", key);
            return false;
        }

        let domain = extract_domain(&url).unwrap_or_default();
        if let Some(wait) = self
            .domains
            .get(&domain)
            .and_then(|state| state.time_until_ready(now))
        {
            tracing::trace!("Domain {} is pacing, deferring {} by {:?}", domain, key, wait);
        }

        let adjusted = priority.clamp(0.0, 1.0) * DEPTH_DECAY.powi(depth as i32);
        self.push(FrontierEntry {
            url,
            priority: adjusted,
            depth,
            discovered_at: Utc::now(),
            seq: 0,
        });
        self.queued.insert(key);
        true
    }

    /// `next` against an explicit clock
    ///
    /// Drains high before medium before low. Entries whose domain is inside its
    /// minimum delay are skipped over and stay queued. The returned entry's
    /// domain is stamped as accessed at `now`.
    pub fn next_at(&mut self, now: Instant) -> Option<FrontierEntry> {
        for tier in 0..self.tiers.len() {
            let mut not_ready = Vec::new();
            let mut found = None;

            while let Some(entry) = self.tiers[tier].pop() {
                let domain = extract_domain(&entry.url).unwrap_or_default();
                let ready = self
                    .domains
                    .get(&domain)
                    .map(|state| !state.is_limited(now))
                    .unwrap_or(true);

                if ready {
                    found = Some((domain, entry));
                    break;
                }
                not_ready.push(entry);
            }

            self.tiers[tier].extend(not_ready);

            if let Some((domain, entry)) = found {
                let min_delay = self.min_delay;
                self.domains
                    .entry(domain)
                    .or_insert_with(|| DomainRateState::new(min_delay))
                    .last_access = Some(now);

                let key = entry.url.as_str().to_string();
                self.queued.remove(&key);
                self.visited.insert(key);

                tracing::trace!("Dequeued {} (priority {:.3})", entry.url, entry.priority);
                return Some(entry);
            }
        }
        None
    }

    /// `can_retry` against an explicit clock
    ///
    /// True while the URL has fewer than `max_retries` recorded failures and more
    /// than `retry_delay_base ^ failures` minutes have passed since the last one.
    pub fn can_retry_at(&self, url: &Url, now: Instant) -> bool {
        let Some(failures) = self.failures.get(url.as_str()) else {
            return true;
        };
        let count = failures.len() as u32;
        if count >= self.max_retries {
            return false;
        }
        let Some(last) = failures.last() else {
            return true;
        };

        let wait = self
            .retry_unit
            .mul_f64(self.retry_delay_base.powi(count as i32));
        now.saturating_duration_since(*last) > wait
    }

    /// `mark_failed` against an explicit clock
    pub fn mark_failed_at(&mut self, url: &Url, now: Instant) {
        let failures = self.failures.entry(url.as_str().to_string()).or_default();
        if (failures.len() as u32) < self.max_retries {
            failures.push(now);
        }
    }

    /// `promote_retries` against an explicit clock
    pub fn promote_retries_at(&mut self, now: Instant) -> usize {
        let parked = std::mem::take(&mut self.parked);
        let mut promoted = 0;

        for entry in parked {
            if self.can_retry_at(&entry.url, now) {
                tracing::debug!("Requeueing {} for retry", entry.url);
                self.queued.insert(entry.url.as_str().to_string());
                self.push(entry);
                promoted += 1;
            } else if self.failure_count(&entry.url) < self.max_retries {
                self.parked.push(entry);
            }
        }
        promoted
    }

    /// `time_until_ready` against an explicit clock
    pub fn time_until_ready_at(&self, now: Instant) -> Option<Duration> {
        let mut min_wait: Option<Duration> = None;
        for entry in self.tiers.iter().flat_map(|tier| tier.iter()) {
            let domain = extract_domain(&entry.url).unwrap_or_default();
            match self
                .domains
                .get(&domain)
                .and_then(|state| state.time_until_ready(now))
            {
                Some(wait) => min_wait = Some(min_wait.map_or(wait, |m| m.min(wait))),
                None => return None,
            }
        }
        min_wait
    }

    /// Recorded failures for a URL
    pub fn failure_count(&self, url: &Url) -> u32 {
        self.failures
            .get(url.as_str())
            .map(|f| f.len() as u32)
            .unwrap_or(0)
    }

    /// Number of entries in a tier
    pub fn tier_len(&self, tier: PriorityTier) -> usize {
        self.tiers[tier.index()].len()
    }

    /// Number of entries waiting for a retry window
    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// Returns true if the URL has been dequeued this session
    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    /// Pacing state for a domain, if it has been accessed
    pub fn domain_state(&self, domain: &str) -> Option<&DomainRateState> {
        self.domains.get(domain)
    }

    fn push(&mut self, mut entry: FrontierEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        let tier = PriorityTier::for_priority(entry.priority);
        self.tiers[tier.index()].push(entry);
    }
}

impl Frontier for UrlQueueManager {
    fn add(&mut self, url: Url, priority: f64, depth: u32) -> bool {
        self.add_at(url, priority, depth, Instant::now())
    }

    fn next(&mut self) -> Option<FrontierEntry> {
        self.next_at(Instant::now())
    }

    fn mark_failed(&mut self, url: &Url) {
        self.mark_failed_at(url, Instant::now())
    }

    fn can_retry(&self, url: &Url) -> bool {
        self.can_retry_at(url, Instant::now())
    }

    fn park_for_retry(&mut self, entry: FrontierEntry) -> bool {
        if self.failure_count(&entry.url) >= self.max_retries {
            return false;
        }
        self.parked.push(entry);
        true
    }

    fn promote_retries(&mut self) -> usize {
        self.promote_retries_at(Instant::now())
    }

    fn time_until_ready(&self) -> Option<Duration> {
        self.time_until_ready_at(Instant::now())
    }

    fn len(&self) -> usize {
        self.tiers.iter().map(BinaryHeap::len).sum()
    }
}
