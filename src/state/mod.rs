//! Session-owned crawl state
//!
//! # Components
//!
//! - `PageStatus`: outcome carried by every page record (success, failed, filtered)
//! - `DomainHealthTracker`: smoothed per-domain health used to slow down against struggling hosts
//! - `CircuitBreaker`: per-URL failure counter with a cooldown window
//! - `CrawlSessionState`: live metrics for one crawl run
//!
//! None of these are shared between sessions; each `CrawlSession` owns its own.

mod circuit_breaker;
mod domain_health;
mod page_status;
mod session_state;

pub use circuit_breaker::{CircuitBreaker, CircuitPosition, CircuitState};
pub use domain_health::{DomainHealthTracker, MAX_HEALTH, MIN_HEALTH};
pub use page_status::PageStatus;
pub use session_state::{CrawlSessionState, ETA_MIN_PAGES, MAX_ADAPTIVE_DELAY, RESPONSE_WINDOW};
