//! Outbound link ranking
//!
//! Scores links found on a crawled page so the frontier visits documentation
//! before boilerplate. Scoring is purely lexical: anchor text and URL path.

use url::Url;

const BASE_PRIORITY: f64 = 0.5;

/// Path segments beyond this depth are penalised
const SEGMENT_ALLOWANCE: usize = 4;

const HIGH_VALUE_ANCHORS: &[&str] = &[
    "documentation",
    "docs",
    "guide",
    "tutorial",
    "api",
    "reference",
    "help",
    "manual",
];

const NEWS_ANCHORS: &[&str] = &["blog", "news", "article", "post", "update", "announcement"];

const HIGH_VALUE_PATHS: &[&str] = &["/docs/", "/api/", "/guide/", "/guides/", "/documentation/"];

const NEWS_PATHS: &[&str] = &["/blog/", "/news/"];

const LOW_VALUE_TERMS: &[&str] = &[
    "contact", "privacy", "terms", "login", "signin", "sign-in", "signup", "register", "cart",
    "checkout", "cookie",
];

const NON_CONTENT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "css", "js", "woff", "woff2", "ttf",
    "mp4", "mp3", "zip",
];

/// A link considered for the frontier
#[derive(Debug, Clone)]
pub struct RankedLink {
    pub url: Url,
    pub priority: f64,

    /// Depth the link would be crawled at
    pub depth: u32,
}

/// Scores outbound links by anchor text, path shape and parent quality
#[derive(Debug, Clone, Default)]
pub struct UrlDiscoveryRanker;

impl UrlDiscoveryRanker {
    pub fn new() -> Self {
        Self
    }

    /// Priority in `[0, 1]` for one link
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute link target
    /// * `anchor_text` - Visible text of the link
    /// * `parent_quality` - Overall quality of the page the link was found on
    pub fn score(&self, url: &Url, anchor_text: &str, parent_quality: f64) -> f64 {
        let anchor = anchor_text.to_lowercase();
        let path = url.path().to_lowercase();
        let mut priority = BASE_PRIORITY;

        if contains_any(&anchor, HIGH_VALUE_ANCHORS) {
            priority += 0.3;
        }
        if contains_any(&anchor, NEWS_ANCHORS) {
            priority += 0.2;
        }

        // Match directory markers with a trailing slash so "/docs" counts too
        let dir_path = format!("{}/", path.trim_end_matches('/'));
        if contains_any(&dir_path, HIGH_VALUE_PATHS) {
            priority += 0.4;
        }
        if contains_any(&dir_path, NEWS_PATHS) {
            priority += 0.2;
        }

        let segments = path.split('/').filter(|s| !s.is_empty()).count();
        if segments > SEGMENT_ALLOWANCE {
            priority -= 0.1 * (segments - SEGMENT_ALLOWANCE) as f64;
        }

        if contains_any(&path, LOW_VALUE_TERMS) || contains_any(&anchor, LOW_VALUE_TERMS) {
            priority -= 0.3;
        }

        match extension(&path) {
            Some("pdf") => priority += 0.2,
            Some(ext) if NON_CONTENT_EXTENSIONS.contains(&ext) => priority -= 0.5,
            _ => {}
        }

        priority *= 0.5 + 0.5 * parent_quality.clamp(0.0, 1.0);
        priority.clamp(0.0, 1.0)
    }

    /// Ranks a page's links, highest priority first
    ///
    /// `parent_depth` is the depth of the page the links were found on; every
    /// ranked link is one level deeper.
    pub fn rank<'a, I>(&self, links: I, parent_quality: f64, parent_depth: u32) -> Vec<RankedLink>
    where
        I: IntoIterator<Item = (&'a Url, &'a str)>,
    {
        let mut ranked: Vec<RankedLink> = links
            .into_iter()
            .map(|(url, anchor)| RankedLink {
                url: url.clone(),
                priority: self.score(url, anchor, parent_quality),
                depth: parent_depth + 1,
            })
            .collect();
        ranked.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        ranked
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn extension(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    Some(ext)
}
