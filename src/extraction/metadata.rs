//! Structured page metadata
//!
//! Metadata is a sum type over document kinds. Fields every kind shares sit on
//! the variant structs; rarely used values go into a string `extensions` map so
//! the record shape stays fixed.

use crate::extraction::date::parse_date;
use crate::extraction::{ExtractedImage, ExtractedLink, StageError};
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata attached to a page record, by document kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuredMetadata {
    Html(HtmlMetadata),
    PlainText(TextMetadata),
}

impl StructuredMetadata {
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Html(m) => m.title.as_deref(),
            Self::PlainText(m) => m.title.as_deref(),
        }
    }

    /// Declared language, lowercased two-letter code
    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Html(m) => m.language.as_deref(),
            Self::PlainText(_) => None,
        }
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Html(m) => m.published_at,
            Self::PlainText(_) => None,
        }
    }

    pub fn extensions(&self) -> &BTreeMap<String, String> {
        match self {
            Self::Html(m) => &m.extensions,
            Self::PlainText(m) => &m.extensions,
        }
    }

    /// Name of the variant as stored
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Html(_) => "html",
            Self::PlainText(_) => "plain_text",
        }
    }
}

/// Metadata read from an HTML head and body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub canonical_url: Option<String>,
    pub headings: Vec<String>,

    /// `og:*` properties, prefix stripped
    pub open_graph: BTreeMap<String, String>,

    /// `twitter:*` properties, prefix stripped
    pub twitter: BTreeMap<String, String>,

    /// Parsed `application/ld+json` blocks
    pub json_ld: Vec<serde_json::Value>,

    pub published_at: Option<DateTime<Utc>>,

    /// Images in the document, capped at `max-images`
    #[serde(default)]
    pub images: Vec<ExtractedImage>,

    /// Outbound links, capped at `max-links`, each tagged internal or external
    #[serde(default)]
    pub links: Vec<ExtractedLink>,

    /// Tables inside the content container
    #[serde(default)]
    pub tables: usize,

    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

impl HtmlMetadata {
    pub fn internal_links(&self) -> impl Iterator<Item = &ExtractedLink> {
        self.links.iter().filter(|link| link.internal)
    }

    pub fn external_links(&self) -> impl Iterator<Item = &ExtractedLink> {
        self.links.iter().filter(|link| !link.internal)
    }
}

/// Metadata for a `text/plain` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextMetadata {
    /// First non-empty line
    pub title: Option<String>,
    pub line_count: usize,

    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

impl TextMetadata {
    pub fn from_text(text: &str) -> Self {
        Self {
            title: text
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(|line| line.chars().take(200).collect()),
            line_count: text.lines().count(),
            extensions: BTreeMap::new(),
        }
    }
}

/// Meta names copied into `extensions` when present
const EXTENSION_META: &[&str] = &["author", "keywords", "robots", "generator"];

/// Reads metadata from a parsed HTML document
///
/// Malformed JSON-LD blocks are skipped and reported as stage errors; the rest
/// of the metadata is still returned.
pub fn extract_html_metadata(document: &Html) -> (HtmlMetadata, Vec<StageError>) {
    let mut errors = Vec::new();
    let mut meta = HtmlMetadata {
        title: select_text(document, "title"),
        description: meta_content(document, r#"meta[name="description"]"#),
        language: select_attr(document, "html[lang]", "lang").map(|lang| primary_language(&lang)),
        canonical_url: select_attr(document, r#"link[rel="canonical"][href]"#, "href"),
        headings: all_text(document, "h1, h2, h3, h4, h5, h6"),
        open_graph: prefixed_meta(document, "property", "og:"),
        twitter: prefixed_meta(document, "name", "twitter:"),
        ..HtmlMetadata::default()
    };

    if let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) {
        for script in document.select(&selector) {
            let raw: String = script.text().collect();
            match serde_json::from_str::<serde_json::Value>(raw.trim()) {
                Ok(value) => meta.json_ld.push(value),
                Err(e) => errors.push(StageError::Extract {
                    step: "json-ld",
                    message: e.to_string(),
                }),
            }
        }
    }

    if meta.title.is_none() {
        meta.title = meta
            .open_graph
            .get("title")
            .cloned()
            .or_else(|| meta.headings.first().cloned());
    }
    if meta.description.is_none() {
        meta.description = meta.open_graph.get("description").cloned();
    }

    meta.published_at = published_candidates(document, &meta)
        .iter()
        .find_map(|candidate| parse_date(candidate));

    for name in EXTENSION_META {
        if let Some(value) = meta_content(document, &format!(r#"meta[name="{}"]"#, name)) {
            meta.extensions.insert((*name).to_string(), value);
        }
    }

    (meta, errors)
}

/// Date strings that may hold the publish date, most authoritative first
fn published_candidates(document: &Html, meta: &HtmlMetadata) -> Vec<String> {
    let mut candidates = Vec::new();

    for selector in [
        r#"meta[property="article:published_time"]"#,
        r#"meta[itemprop="datePublished"]"#,
        r#"meta[name="date"]"#,
        r#"meta[name="publish-date"]"#,
    ] {
        if let Some(value) = meta_content(document, selector) {
            candidates.push(value);
        }
    }

    for block in &meta.json_ld {
        if let Some(date) = json_ld_date(block) {
            candidates.push(date);
        }
    }

    if let Some(datetime) = select_attr(document, "time[datetime]", "datetime") {
        candidates.push(datetime);
    }

    candidates
}

fn json_ld_date(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => map
            .get("datePublished")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| map.get("@graph").and_then(json_ld_date)),
        serde_json::Value::Array(items) => items.iter().find_map(json_ld_date),
        _ => None,
    }
}

/// `en-US` becomes `en`
fn primary_language(lang: &str) -> String {
    lang.split(['-', '_'])
        .next()
        .unwrap_or(lang)
        .trim()
        .to_lowercase()
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

fn all_text(document: &Html, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .collect()
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .find_map(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    select_attr(document, selector, "content")
}

fn prefixed_meta(document: &Html, key_attr: &str, prefix: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let Ok(selector) = Selector::parse("meta[content]") else {
        return out;
    };
    for el in document.select(&selector) {
        let (Some(key), Some(content)) = (el.value().attr(key_attr), el.value().attr("content"))
        else {
            continue;
        };
        if let Some(name) = key.strip_prefix(prefix) {
            out.entry(name.to_string())
                .or_insert_with(|| content.trim().to_string());
        }
    }
    out
}
