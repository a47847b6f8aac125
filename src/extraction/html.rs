//! HTML body extraction: main text, links, images and structure counts

use crate::extraction::text::normalize_whitespace;
use crate::extraction::{ExtractedImage, ExtractedLink, StageError, StructureCounts};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Content containers, most specific first
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    r#"[role="main"]"#,
    "#content",
    ".content",
    ".post-content",
    ".entry-content",
    "body",
];

/// Elements whose text is never part of the page content
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "aside", "form", "iframe", "svg",
    "template", "button",
];

/// Elements that end a line of text
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol",
    "blockquote", "pre", "table", "tr", "td", "th", "br", "hr", "dd", "dt", "figcaption",
];

/// Picks the content container and returns its text
///
/// The first selector in `CONTENT_SELECTORS` whose match yields any text wins.
/// Returns `None` if the document has no text at all.
pub fn extract_main_text(document: &Html) -> Result<Option<(String, StructureCounts)>, StageError> {
    for css in CONTENT_SELECTORS {
        let selector = Selector::parse(css).map_err(|e| StageError::Extract {
            step: "text",
            message: format!("bad selector {}: {:?}", css, e),
        })?;

        for container in document.select(&selector) {
            let mut raw = String::new();
            collect_text(container, &mut raw);
            let text = normalize_whitespace(&raw);
            if !text.is_empty() {
                return Ok(Some((text, structure_counts(container))));
            }
        }
    }
    Ok(None)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                if is_boilerplate(el) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_TAGS.contains(&el.name());
                if block {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
                collect_text(child_ref, out);
                out.push(if block { '\n' } else { ' ' });
            }
            _ => {}
        }
    }
}

fn is_boilerplate(el: &Element) -> bool {
    if SKIPPED_TAGS.contains(&el.name()) {
        return true;
    }
    if el.attr("aria-hidden") == Some("true") || el.attr("hidden").is_some() {
        return true;
    }
    el.classes().any(is_ad_marker) || el.id().map(is_ad_marker).unwrap_or(false)
}

/// Class or id tokens used for ads and promotional blocks
fn is_ad_marker(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    matches!(token.as_str(), "ad" | "ads" | "advert" | "banner")
        || token.starts_with("ad-")
        || token.starts_with("ads-")
        || token.starts_with("ad_")
        || token.contains("advert")
        || token.contains("sponsor")
        || token.contains("promo")
        || token.contains("cookie")
}

fn structure_counts(container: ElementRef<'_>) -> StructureCounts {
    let count = |css: &str| {
        Selector::parse(css)
            .map(|selector| container.select(&selector).count())
            .unwrap_or(0)
    };
    StructureCounts {
        headings: count("h1, h2, h3, h4, h5, h6"),
        lists: count("ul, ol, dl"),
        quotes: count("blockquote, q"),
        tables: count("table"),
    }
}

/// Collects outbound links, resolved against `base`
///
/// Links are deduplicated, stripped of fragments, and capped at `max_links`.
/// `internal` is set when the link points at the same host as `base`.
pub fn extract_links(document: &Html, base: &Url, max_links: usize) -> Result<Vec<ExtractedLink>, StageError> {
    let selector = Selector::parse("a[href]").map_err(|e| StageError::Extract {
        step: "links",
        message: format!("{:?}", e),
    })?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        if links.len() >= max_links {
            break;
        }
        if element.value().attr("download").is_some() {
            continue;
        }
        let Some(url) = element.value().attr("href").and_then(|href| resolve_link(href, base)) else {
            continue;
        };
        if !seen.insert(url.as_str().to_string()) {
            continue;
        }

        let anchor_text = element
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let anchor_text = if anchor_text.is_empty() {
            element.value().attr("title").unwrap_or("").to_string()
        } else {
            anchor_text
        };

        links.push(ExtractedLink {
            internal: url.host_str() == base.host_str(),
            url,
            anchor_text,
        });
    }

    Ok(links)
}

/// Collects images with alt text and declared dimensions, capped at `max_images`
pub fn extract_images(document: &Html, base: &Url, max_images: usize) -> Result<Vec<ExtractedImage>, StageError> {
    let selector = Selector::parse("img[src]").map_err(|e| StageError::Extract {
        step: "images",
        message: format!("{:?}", e),
    })?;

    let images = document
        .select(&selector)
        .filter_map(|img| {
            let el = img.value();
            let url = el.attr("src").and_then(|src| resolve_link(src, base))?;
            Some(ExtractedImage {
                url,
                alt: el
                    .attr("alt")
                    .map(str::trim)
                    .filter(|alt| !alt.is_empty())
                    .map(str::to_string),
                width: el.attr("width").and_then(parse_dimension),
                height: el.attr("height").and_then(parse_dimension),
            })
        })
        .take(max_images)
        .collect();

    Ok(images)
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.trim().trim_end_matches("px").parse().ok()
}

/// Resolves an href to an absolute http(s) URL
///
/// Returns None for `javascript:`, `mailto:`, `tel:` and `data:` links, for
/// fragment-only links and for anything that fails to parse.
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
