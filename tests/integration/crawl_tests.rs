//! Integration tests for the crawler
//!
//! These tests use wiremock to serve small sites and drive a full crawl
//! session against a real fetcher and an on-disk SQLite database.

use quarry::config::Config;
use quarry::crawler::{CrawlSession, ReqwestFetcher};
use quarry::storage::{SessionStatus, SqliteStorage};
use quarry::{normalize_url, url_hash, PageStatus};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A page with enough English prose to pass the pipeline
fn article(title: &str, links: &[&str]) -> String {
    let paragraphs: String = (0..6)
        .map(|i| {
            format!(
                "<p>This {} article covers part {} of how the service indexes documents and why the team measured 42 separate workloads.</p>",
                title, i
            )
        })
        .collect();
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<li><a href="{}">{}</a></li>"#, href, href))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><title>{}</title></head>
<body>
  <article><h1>{}</h1>{}</article>
  <nav><ul>{}</ul></nav>
</body>
</html>"#,
        title, title, paragraphs, anchors
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

fn test_config(seed: &str, db_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.seeds = vec![seed.to_string()];
    config.crawler.delay_ms = 0;
    config.crawler.quality_threshold = 0.0;
    config.crawler.user_agent = "QuarryTest/1.0".to_string();
    config.crawler.request_timeout_secs = 5;
    config.crawler.connect_timeout_secs = 2;
    config.retry.base_delay_ms = 1;
    config.retry.jitter = false;
    config.pipeline.min_word_count = 20;
    config.pipeline.min_quality_score = 0.0;
    config.output.database_path = db_dir
        .path()
        .join("quarry.db")
        .to_string_lossy()
        .into_owned();
    config
}

fn open_store(config: &Config) -> Arc<SqliteStorage> {
    Arc::new(SqliteStorage::new(std::path::Path::new(&config.output.database_path)).unwrap())
}

fn hash_of(url: &str) -> String {
    url_hash(&normalize_url(url).unwrap())
}

#[tokio::test]
async fn test_full_crawl_stores_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    serve(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"),
    )
    .await;
    serve(&server, "/", html(article("Home", &["/docs/guide", "/blog/launch"]))).await;
    serve(&server, "/docs/guide", html(article("Guide", &["/"]))).await;
    serve(&server, "/blog/launch", html(article("Launch", &[]))).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&format!("{}/", base), &dir);
    let store = open_store(&config);
    let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();

    let mut session = CrawlSession::new(config, fetcher, Arc::clone(&store)).unwrap();
    let summary = session.run().await.unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert!(summary.bytes_downloaded > 0);
    assert_eq!(store.count_pages().unwrap(), 3);

    let guide = store
        .get_page(&hash_of(&format!("{}/docs/guide", base)))
        .unwrap()
        .expect("guide should be stored");
    assert_eq!(guide.title.as_deref(), Some("Guide"));
    assert_eq!(guide.status, PageStatus::Success);
    assert_eq!(guide.depth, 1);
    assert!(guide.quality_overall.is_some());
    assert!(!guide.keywords.is_empty());
}

#[tokio::test]
async fn test_pages_survive_reopen() {
    let server = MockServer::start().await;
    serve(&server, "/", html(article("Home", &[]))).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&format!("{}/", server.uri()), &dir);
    let db_path = config.output.database_path.clone();

    {
        let store = open_store(&config);
        let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();
        let mut session = CrawlSession::new(config, fetcher, Arc::clone(&store)).unwrap();
        let id = session.state().session_id.to_string();
        store.begin_session(&id, "hash").unwrap();
        let summary = session.run().await.unwrap();
        store
            .finish_session(&summary, SessionStatus::Completed)
            .unwrap();
    }

    let reopened = SqliteStorage::new(std::path::Path::new(&db_path)).unwrap();
    let stats = reopened.page_stats().unwrap();
    assert_eq!(stats.total_pages, 1);
    assert_eq!(stats.session_count, 1);
    let last = stats.last_session.unwrap();
    assert_eq!(last.status, SessionStatus::Completed);
    assert_eq!(last.succeeded, 1);
}

#[tokio::test]
async fn test_robots_disallow_is_honored() {
    let server = MockServer::start().await;

    serve(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
    )
    .await;
    serve(&server, "/", html(article("Home", &["/private/data", "/public"]))).await;
    serve(&server, "/public", html(article("Public", &[]))).await;
    Mock::given(method("GET"))
        .and(path("/private/data"))
        .respond_with(html(article("Secret", &[])))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&format!("{}/", server.uri()), &dir);
    let store = open_store(&config);
    let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();

    let summary = CrawlSession::new(config, fetcher, Arc::clone(&store))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_circuit_opens_after_repeated_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&format!("{}/flaky", server.uri()), &dir);
    config.crawler.respect_robots = false;
    config.crawler.max_retries = 5;
    config.crawler.circuit_breaker_threshold = 3;
    config.crawler.circuit_breaker_cooldown_seconds = 300;

    let store = open_store(&config);
    let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();
    let mut session = CrawlSession::new(config, fetcher, Arc::clone(&store)).unwrap();
    let summary = session.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.open_circuits, 1);
    assert_eq!(store.count_pages().unwrap(), 0);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    serve(&server, "/", html(article("Home", &["/gone"]))).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&format!("{}/", server.uri()), &dir);
    config.crawler.respect_robots = false;

    let store = open_store(&config);
    let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();
    let summary = CrawlSession::new(config, fetcher, store)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_unsupported_content_type_fails_once() {
    let server = MockServer::start().await;
    serve(&server, "/", html(article("Home", &["/logo.png"]))).await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89u8, 0x50, 0x4e, 0x47], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&format!("{}/", server.uri()), &dir);
    config.crawler.respect_robots = false;

    let store = open_store(&config);
    let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();
    let summary = CrawlSession::new(config, fetcher, Arc::clone(&store))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(store.count_pages().unwrap(), 1);
}

#[tokio::test]
async fn test_plain_text_document_is_stored() {
    let server = MockServer::start().await;
    let notes = "Release notes\n\nThis release improves how the service indexes documents. \
                 The team measured 42 workloads and fixed several slow paths in the storage layer. \
                 Every change was reviewed and tested before the release went out to users.";
    serve(
        &server,
        "/notes.txt",
        ResponseTemplate::new(200).set_body_raw(notes, "text/plain"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&format!("{}/notes.txt", server.uri()), &dir);
    config.crawler.respect_robots = false;

    let store = open_store(&config);
    let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();
    let summary = CrawlSession::new(config, fetcher, Arc::clone(&store))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    let page = store
        .get_page(&hash_of(&format!("{}/notes.txt", server.uri())))
        .unwrap()
        .unwrap();
    assert_eq!(page.title.as_deref(), Some("Release notes"));
}

#[tokio::test]
async fn test_duplicate_page_not_stored_twice() {
    let server = MockServer::start().await;
    serve(&server, "/", html(article("Home", &["/a", "/b"]))).await;
    serve(&server, "/a", html(article("Mirror", &[]))).await;
    serve(&server, "/b", html(article("Mirror", &[]))).await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&format!("{}/", server.uri()), &dir);
    config.crawler.respect_robots = false;

    let store = open_store(&config);
    let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();
    let summary = CrawlSession::new(config, fetcher, Arc::clone(&store))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.filtered, 1);
    assert_eq!(store.count_pages().unwrap(), 2);
}

#[tokio::test]
async fn test_quality_threshold_gates_storage() {
    let server = MockServer::start().await;
    serve(&server, "/", html(article("Home", &["/next"]))).await;
    serve(&server, "/next", html(article("Next", &[]))).await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&format!("{}/", server.uri()), &dir);
    config.crawler.respect_robots = false;
    config.crawler.quality_threshold = 1.0;

    let store = open_store(&config);
    let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();
    let summary = CrawlSession::new(config, fetcher, Arc::clone(&store))
        .unwrap()
        .run()
        .await
        .unwrap();

    // Rejected pages still lead the crawl to their links
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.filtered, 2);
    assert_eq!(store.count_pages().unwrap(), 0);
}

#[tokio::test]
async fn test_recently_crawled_page_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(article("Home", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&format!("{}/", server.uri()), &dir);
    config.crawler.respect_robots = false;
    config.crawler.recrawl_interval_hours = 24;

    for expected_skips in [0, 1] {
        let store = open_store(&config);
        let fetcher = ReqwestFetcher::new(&config.crawler).unwrap();
        let summary = CrawlSession::new(config.clone(), fetcher, store)
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(summary.skipped, expected_skips);
    }
}
