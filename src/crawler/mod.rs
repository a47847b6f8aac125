//! Crawler module: frontier, fetching, retries, link ranking and the session loop
//!
//! - [`UrlQueueManager`]: tiered priority frontier with per-domain pacing
//! - [`HttpFetch`] / [`ReqwestFetcher`]: the network capability
//! - [`FetchRetryEngine`]: backoff retries behind a per-URL circuit breaker
//! - [`UrlDiscoveryRanker`]: priorities for newly found links
//! - [`CrawlSession`]: drives one crawl from seeds to summary

mod discovery;
mod fetcher;
mod queue;
mod retry;
mod session;

pub use discovery::{RankedLink, UrlDiscoveryRanker};
pub use fetcher::{build_http_client, media_type, FetchError, HttpFetch, HttpResponse, ReqwestFetcher};
pub use queue::{
    DomainRateState, Frontier, FrontierEntry, PriorityTier, UrlQueueManager, DEPTH_DECAY,
    HIGH_PRIORITY, MEDIUM_PRIORITY, RETRY_UNIT,
};
pub use retry::{FetchRetryEngine, RetryError, RetryPolicy};
pub use session::{CrawlSession, SessionSummary};
