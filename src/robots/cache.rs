//! Session-scoped robots.txt cache
//!
//! Each domain's robots.txt is fetched at most once per session (refreshed only
//! if a session outlives the 24 hour freshness window). Fetch failures of any
//! kind fail open: the domain is treated as unrestricted.

use crate::crawler::HttpFetch;
use crate::robots::parser::product_token;
use crate::robots::ParsedRobots;
use crate::state::MAX_ADAPTIVE_DELAY;
use crate::url::{extract_domain, robots_url};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Parsed robots.txt plus the time it was fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// True once the entry is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > ChronoDuration::hours(24)
    }
}

/// Outcome of a robots check for one URL
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotsCheck {
    pub allowed: bool,

    /// Crawl-delay the domain asks of us, if any
    pub crawl_delay: Option<Duration>,
}

/// Per-session robots.txt cache keyed by domain
#[derive(Debug, Clone)]
pub struct RobotsCache {
    agent: String,
    entries: HashMap<String, CachedRobots>,
}

impl RobotsCache {
    /// Creates an empty cache for the given User-Agent header value
    pub fn new(user_agent: &str) -> Self {
        Self {
            agent: product_token(user_agent).to_string(),
            entries: HashMap::new(),
        }
    }

    /// Checks a URL, fetching its domain's robots.txt on first sight
    ///
    /// # Arguments
    ///
    /// * `fetcher` - HTTP capability used for the robots.txt request
    /// * `url` - The URL about to be crawled
    pub async fn check<F>(&mut self, fetcher: &F, url: &Url) -> RobotsCheck
    where
        F: HttpFetch + ?Sized,
    {
        let Some(domain) = extract_domain(url) else {
            return RobotsCheck {
                allowed: true,
                crawl_delay: None,
            };
        };

        let fresh = self
            .entries
            .get(&domain)
            .map(|cached| !cached.is_stale())
            .unwrap_or(false);

        if !fresh {
            let robots = fetch_robots(fetcher, url).await;
            self.entries.insert(domain.clone(), CachedRobots::new(robots));
        }

        match self.entries.get(&domain) {
            Some(cached) => RobotsCheck {
                allowed: cached.content.is_allowed(url.as_str(), &self.agent),
                crawl_delay: cached
                    .content
                    .crawl_delay(&self.agent)
                    .and_then(bounded_crawl_delay),
            },
            None => RobotsCheck {
                allowed: true,
                crawl_delay: None,
            },
        }
    }

    /// Seeds the cache with rules for a domain
    pub fn insert(&mut self, domain: &str, robots: ParsedRobots) {
        self.entries
            .insert(domain.to_lowercase(), CachedRobots::new(robots));
    }

    /// Number of cached domains
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Converts a Crawl-delay value, capped at the adaptive delay ceiling
///
/// Zero, negative and NaN values mean no delay. Values too large for a
/// `Duration` are capped like any other large value.
fn bounded_crawl_delay(secs: f64) -> Option<Duration> {
    if secs.is_nan() || secs <= 0.0 {
        return None;
    }
    let delay = Duration::try_from_secs_f64(secs).unwrap_or(MAX_ADAPTIVE_DELAY);
    Some(delay.min(MAX_ADAPTIVE_DELAY))
}

async fn fetch_robots<F>(fetcher: &F, url: &Url) -> ParsedRobots
where
    F: HttpFetch + ?Sized,
{
    let Some(robots) = robots_url(url) else {
        return ParsedRobots::allow_all();
    };

    match fetcher.fetch(robots.as_str()).await {
        Ok(response) => {
            tracing::debug!("Fetched {} ({} bytes)", robots, response.body.len());
            ParsedRobots::from_content(&response.body)
        }
        Err(e) => {
            tracing::debug!("No usable robots.txt at {}: {}", robots, e);
            ParsedRobots::allow_all()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{FetchError, HttpResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticRobots {
        body: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpFetch for StaticRobots {
        async fn fetch(&self, url: &str) -> Result<HttpResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.body {
                Some(body) => Ok(HttpResponse {
                    status: 200,
                    final_url: url.to_string(),
                    content_type: Some("text/plain".to_string()),
                    body: body.to_string(),
                    elapsed: Duration::from_millis(5),
                }),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    code: 503,
                }),
            }
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetched_once_per_domain() {
        let fetcher = StaticRobots {
            body: Some("User-agent: *\nDisallow: /private\nCrawl-delay: 2"),
            calls: AtomicUsize::new(0),
        };
        let mut cache = RobotsCache::new("QuarryBot/0.1");

        let open = cache.check(&fetcher, &url("https://example.com/a")).await;
        let closed = cache
            .check(&fetcher, &url("https://example.com/private/b"))
            .await;

        assert!(open.allowed);
        assert!(!closed.allowed);
        assert_eq!(open.crawl_delay, Some(Duration::from_secs(2)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_open() {
        let fetcher = StaticRobots {
            body: None,
            calls: AtomicUsize::new(0),
        };
        let mut cache = RobotsCache::new("QuarryBot/0.1");
        let check = cache.check(&fetcher, &url("https://down.example.com/x")).await;

        assert!(check.allowed);
        assert_eq!(check.crawl_delay, None);
    }

    #[tokio::test]
    async fn test_seeded_entry_skips_fetch() {
        let fetcher = StaticRobots {
            body: Some(""),
            calls: AtomicUsize::new(0),
        };
        let mut cache = RobotsCache::new("QuarryBot");
        cache.insert("Example.com", ParsedRobots::from_content("User-agent: *\nDisallow: /"));

        let check = cache.check(&fetcher, &url("https://example.com/")).await;
        assert!(!check.allowed);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_huge_crawl_delay_capped() {
        for body in [
            "User-agent: *\nCrawl-delay: 1e20",
            "User-agent: *\nCrawl-delay: 86400",
        ] {
            let fetcher = StaticRobots {
                body: Some(body),
                calls: AtomicUsize::new(0),
            };
            let mut cache = RobotsCache::new("QuarryBot/0.1");
            let check = cache.check(&fetcher, &url("https://slow.example.com/")).await;

            assert!(check.allowed);
            assert_eq!(check.crawl_delay, Some(MAX_ADAPTIVE_DELAY));
        }
    }

    #[test]
    fn test_bounded_crawl_delay() {
        assert_eq!(bounded_crawl_delay(0.0), None);
        assert_eq!(bounded_crawl_delay(-3.0), None);
        assert_eq!(bounded_crawl_delay(f64::NAN), None);
        assert_eq!(bounded_crawl_delay(f64::INFINITY), Some(MAX_ADAPTIVE_DELAY));
        assert_eq!(bounded_crawl_delay(1.5), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_stale_after_a_day() {
        let mut cached = CachedRobots::new(ParsedRobots::allow_all());
        assert!(!cached.is_stale());
        cached.fetched_at = Utc::now() - ChronoDuration::hours(25);
        assert!(cached.is_stale());
    }
}
