use serde::Deserialize;

/// Main configuration structure for Quarry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed URLs the session starts from (depth 0)
    pub seeds: Vec<String>,
    pub crawler: CrawlerConfig,
    pub retry: RetryConfig,
    pub queue: QueueConfig,
    pub pipeline: PipelineConfig,
    pub tenant: TenantConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum link depth from the seeds
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of URLs processed in one session
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Base politeness delay between pages (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Regex patterns; when non-empty a URL must match at least one
    #[serde(rename = "include-patterns")]
    pub include_patterns: Vec<String>,

    /// Regex patterns; a URL matching any of these is skipped
    #[serde(rename = "exclude-patterns")]
    pub exclude_patterns: Vec<String>,

    /// Whether links to other sites than the seeds are followed
    #[serde(rename = "follow-external")]
    pub follow_external: bool,

    /// Whether robots.txt is consulted before fetching
    #[serde(rename = "respect-robots")]
    pub respect_robots: bool,

    /// Bodies larger than this are rejected as permanent failures
    #[serde(rename = "max-file-size-bytes")]
    pub max_file_size_bytes: u64,

    /// Records with an overall quality below this are not emitted
    #[serde(rename = "quality-threshold")]
    pub quality_threshold: f64,

    /// Similarity at or above which a page is flagged as a near duplicate
    #[serde(rename = "duplicate-threshold")]
    pub duplicate_threshold: f64,

    /// Retries per fetch after the first attempt
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Failures after which a URL's circuit opens
    #[serde(rename = "circuit-breaker-threshold")]
    pub circuit_breaker_threshold: u32,

    /// Seconds an open circuit stays open
    #[serde(rename = "circuit-breaker-cooldown-seconds")]
    pub circuit_breaker_cooldown_seconds: u64,

    /// User agent sent with every request and matched against robots.txt
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Total per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Skip URLs stored more recently than this many hours (0 disables)
    #[serde(rename = "recrawl-interval-hours")]
    pub recrawl_interval_hours: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 100,
            delay_ms: 1000,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            follow_external: false,
            respect_robots: true,
            max_file_size_bytes: 10 * 1024 * 1024,
            quality_threshold: 0.3,
            duplicate_threshold: 0.85,
            max_retries: 3,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown_seconds: 300,
            user_agent: "QuarryBot/0.1 (+https://example.com/bot)".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            recrawl_interval_hours: 0,
        }
    }
}

/// Retry and backoff tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry (milliseconds)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Growth factor applied per attempt
    #[serde(rename = "backoff-multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for a single backoff sleep (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Apply +/-50% jitter to retry sleeps
    pub jitter: bool,

    /// Base of the minutes-scaled backoff used for re-queueing failed URLs
    #[serde(rename = "retry-delay-base")]
    pub retry_delay_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 60_000,
            jitter: true,
            retry_delay_base: 2.0,
        }
    }
}

/// Frontier pacing configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Minimum time between two accesses to the same domain (milliseconds)
    #[serde(rename = "domain-min-delay-ms")]
    pub domain_min_delay_ms: u64,
}

/// Extraction pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pages with fewer words are filtered
    #[serde(rename = "min-word-count")]
    pub min_word_count: usize,

    /// Pages scoring below this are filtered before enrichment
    #[serde(rename = "min-quality-score")]
    pub min_quality_score: f64,

    /// ISO 639-1 codes; empty allows every language
    #[serde(rename = "allowed-languages")]
    pub allowed_languages: Vec<String>,

    /// Cap on extracted links per category (internal, external)
    #[serde(rename = "max-links")]
    pub max_links: usize,

    /// Cap on extracted images
    #[serde(rename = "max-images")]
    pub max_images: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_word_count: 50,
            min_quality_score: 0.1,
            allowed_languages: vec!["en".to_string()],
            max_links: 200,
            max_images: 20,
        }
    }
}

/// Tenant identifiers attached to every stored record
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TenantConfig {
    #[serde(rename = "organization-id")]
    pub organization_id: String,

    #[serde(rename = "domain-id")]
    pub domain_id: String,

    #[serde(rename = "connector-id")]
    pub connector_id: String,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            organization_id: "default".to_string(),
            domain_id: "default".to_string(),
            connector_id: "web".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./quarry.db".to_string(),
        }
    }
}
