//! HTTP fetcher implementation
//!
//! This module holds the crawler's only network capability:
//! - `HttpFetch`, the transport-agnostic fetch contract the session and the
//!   robots cache are written against
//! - `ReqwestFetcher`, the production implementation
//! - `FetchError`, with the transient/permanent classification the retry engine
//!   relies on

use crate::config::CrawlerConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from a single fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("HTTP {code} from {url}")]
    Status { url: String, code: u16 },

    #[error("Unsupported content type '{content_type}' at {url}")]
    UnsupportedContentType { url: String, content_type: String },

    #[error("Body of {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Returns true if the failure is worth retrying
    ///
    /// | Condition | Class |
    /// |-----------|-------|
    /// | Timeout, connect failure, reset | transient |
    /// | HTTP 5xx, HTTP 429 | transient |
    /// | HTTP 404 and other 4xx | permanent |
    /// | Content type, body size | permanent |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } | Self::Network { .. } => true,
            Self::Status { code, .. } => *code == 429 || (500..600).contains(code),
            Self::UnsupportedContentType { .. } | Self::TooLarge { .. } => false,
        }
    }

    /// Short reason stored on failed page records
    pub fn reason(&self) -> String {
        match self {
            Self::Timeout { .. } => "timeout".to_string(),
            Self::Connect { .. } => "connection failed".to_string(),
            Self::Status { code, .. } => format!("http {}", code),
            Self::UnsupportedContentType { content_type, .. } => {
                format!("unsupported content type {}", content_type)
            }
            Self::TooLarge { limit, .. } => format!("body larger than {} bytes", limit),
            Self::Network { message, .. } => format!("network error: {}", message),
        }
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,

    /// URL after redirects
    pub final_url: String,

    /// Media type without parameters, lowercased
    pub content_type: Option<String>,

    pub body: String,

    /// Time from sending the request to reading the last body byte
    pub elapsed: Duration,
}

impl HttpResponse {
    /// Body size in bytes
    pub fn bytes(&self) -> u64 {
        self.body.len() as u64
    }
}

/// The network capability the crawler needs
///
/// Implementations return `Err(FetchError::Status)` for non-2xx responses so
/// callers only ever see bodies worth processing.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - Crawler configuration (user agent and timeouts)
///
/// # Example
///
/// ```no_run
/// use quarry::config::CrawlerConfig;
/// use quarry::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `HttpFetch` backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    max_body_bytes: u64,
}

impl ReqwestFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            max_body_bytes: config.max_file_size_bytes,
        })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let started = Instant::now();
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type);

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_body_bytes,
                });
            }
        }

        // Content-Length can be absent or wrong, so the limit is enforced while reading
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify_error(url, e))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            final_url,
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
            elapsed: started.elapsed(),
        })
    }
}

/// Strips parameters from a Content-Type value
///
/// `"text/html; charset=utf-8"` becomes `"text/html"`.
pub fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

fn classify_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}
