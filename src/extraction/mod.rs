//! Content extraction pipeline
//!
//! A fetched document goes through three fixed stages:
//!
//! 1. **Extract**: main text, metadata, links and images
//! 2. **Filter**: minimum word count, minimum quality, allowed languages
//! 3. **Enrich**: keywords, topics, sentiment and reading ease
//!
//! Each step returns `Result<T, StageError>`. A failing step is logged and
//! recorded on the output; the remaining steps still run. Only a filter
//! rejection ends the pipeline early.

pub mod date;
mod enrich;
mod filter;
mod html;
mod metadata;
pub mod text;

pub use enrich::{categorize, enrich, extract_keywords, reading_ease, sentiment, Enrichment, MAX_KEYWORDS};
pub use filter::{detect_language, ContentFilter, FilterRejection};
pub use html::{extract_images, extract_links, extract_main_text, resolve_link};
pub use metadata::{extract_html_metadata, HtmlMetadata, StructuredMetadata, TextMetadata};

use crate::config::PipelineConfig;
use crate::quality::{Assessment, QualityScorer, ScoringInput};
use crate::url::extract_domain;
use scraper::Html;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// A failed step inside one pipeline stage
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error("extractor '{step}' failed: {message}")]
    Extract { step: &'static str, message: String },

    #[error("filter '{step}' failed: {message}")]
    Filter { step: &'static str, message: String },

    #[error("enricher '{step}' failed: {message}")]
    Enrich { step: &'static str, message: String },
}

/// Document kinds the pipeline can extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    PlainText,
}

impl DocumentKind {
    /// Maps a media type to a document kind
    ///
    /// A missing Content-Type is treated as HTML. Anything other than HTML or
    /// plain text returns `None`.
    pub fn from_content_type(content_type: Option<&str>) -> Option<Self> {
        match content_type.map(str::trim) {
            None | Some("") => Some(Self::Html),
            Some("text/html") | Some("application/xhtml+xml") => Some(Self::Html),
            Some("text/plain") => Some(Self::PlainText),
            Some(_) => None,
        }
    }
}

/// Structural element counts in the content container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructureCounts {
    pub headings: usize,
    pub lists: usize,
    pub quotes: usize,
    pub tables: usize,
}

/// An outbound link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub url: Url,
    pub anchor_text: String,

    /// Same host as the page it was found on
    pub internal: bool,
}

/// An image referenced by the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub url: Url,
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Output of the extract stage
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub text: String,
    pub word_count: usize,

    /// Raw body size in bytes
    pub raw_size: usize,

    pub structure: StructureCounts,

    /// HTML metadata also carries the page's images and categorised links
    pub metadata: StructuredMetadata,

    /// Links handed to discovery
    pub links: Vec<ExtractedLink>,
}

impl ExtractedContent {
    /// View handed to the quality scorer
    pub fn scoring_input<'a>(&'a self, domain: &'a str) -> ScoringInput<'a> {
        ScoringInput {
            text: &self.text,
            word_count: self.word_count,
            raw_size: self.raw_size,
            domain,
            headings: self.structure.headings,
            lists: self.structure.lists,
            quotes: self.structure.quotes,
            published: self
                .metadata
                .published_at()
                .or_else(|| date::find_date_in_text(&self.text)),
        }
    }

    /// Language declared by the page or detected from its text
    pub fn language(&self) -> Option<String> {
        self.metadata
            .language()
            .map(str::to_string)
            .or_else(|| detect_language(&self.text).ok())
    }
}

/// Result of the filter stage
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Accepted(Enrichment),
    Filtered(FilterRejection),
}

/// Everything the pipeline produced for one document
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub content: ExtractedContent,
    pub quality: Assessment,
    pub outcome: PipelineOutcome,
    pub stage_errors: Vec<StageError>,
}

impl PipelineOutput {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Accepted(_))
    }
}

/// The extract → filter → enrich pipeline
#[derive(Debug, Clone)]
pub struct ContentExtractionPipeline {
    filter: ContentFilter,
    max_links: usize,
    max_images: usize,
}

impl ContentExtractionPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            filter: ContentFilter::new(config),
            max_links: config.max_links,
            max_images: config.max_images,
        }
    }

    /// Runs all stages over a fetched body
    ///
    /// The page is scored (and entered into the duplicate window) between
    /// extraction and filtering, since the quality filter needs the score.
    ///
    /// # Arguments
    ///
    /// * `url` - Final URL of the document, used to resolve links
    /// * `body` - Decoded response body
    /// * `kind` - Document kind from the Content-Type
    /// * `scorer` - The session's quality scorer
    pub fn run(
        &self,
        url: &Url,
        body: &str,
        kind: DocumentKind,
        scorer: &mut QualityScorer,
    ) -> PipelineOutput {
        let mut stage_errors = Vec::new();

        let content = match kind {
            DocumentKind::Html => self.extract_html(url, body, &mut stage_errors),
            DocumentKind::PlainText => extract_plain_text(body),
        };

        let domain = extract_domain(url).unwrap_or_default();
        let quality = scorer.assess(&content.scoring_input(&domain));

        let outcome = match self
            .filter
            .check(&content, quality.metrics.overall, &mut stage_errors)
        {
            Ok(()) => PipelineOutcome::Accepted(enrich(&content.text, &mut stage_errors)),
            Err(rejection) => {
                tracing::debug!("Filtered {}: {}", url, rejection);
                PipelineOutcome::Filtered(rejection)
            }
        };

        for error in &stage_errors {
            tracing::warn!("{} at {}", error, url);
        }

        PipelineOutput {
            content,
            quality,
            outcome,
            stage_errors,
        }
    }

    fn extract_html(&self, url: &Url, body: &str, errors: &mut Vec<StageError>) -> ExtractedContent {
        let document = Html::parse_document(body);

        let (text, structure) = match extract_main_text(&document) {
            Ok(Some(found)) => found,
            Ok(None) => (String::new(), StructureCounts::default()),
            Err(e) => {
                errors.push(e);
                (String::new(), StructureCounts::default())
            }
        };

        let (mut metadata, metadata_errors) = extract_html_metadata(&document);
        errors.extend(metadata_errors);

        let links = extract_links(&document, url, self.max_links).unwrap_or_else(|e| {
            errors.push(e);
            Vec::new()
        });
        metadata.images = extract_images(&document, url, self.max_images).unwrap_or_else(|e| {
            errors.push(e);
            Vec::new()
        });
        metadata.links = links.clone();
        metadata.tables = structure.tables;

        ExtractedContent {
            title: metadata.title.clone(),
            word_count: text::word_count(&text),
            raw_size: body.len(),
            text,
            structure,
            metadata: StructuredMetadata::Html(metadata),
            links,
        }
    }
}

fn extract_plain_text(body: &str) -> ExtractedContent {
    let text = text::normalize_whitespace(body);
    let metadata = TextMetadata::from_text(&text);
    let lists = text
        .lines()
        .filter(|line| line.starts_with("- ") || line.starts_with("* "))
        .count();

    ExtractedContent {
        title: metadata.title.clone(),
        word_count: text::word_count(&text),
        raw_size: body.len(),
        structure: StructureCounts {
            lists: usize::from(lists > 0),
            ..StructureCounts::default()
        },
        text,
        metadata: StructuredMetadata::PlainText(metadata),
        links: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(min_words: usize) -> ContentExtractionPipeline {
        ContentExtractionPipeline::new(&PipelineConfig {
            min_word_count: min_words,
            min_quality_score: 0.1,
            allowed_languages: vec!["en".to_string()],
            max_links: 50,
            max_images: 5,
        })
    }

    fn page(paragraphs: usize) -> String {
        let body: String = (0..paragraphs)
            .map(|i| {
                format!(
                    "<p>This guide explains how the crawler handles page {} and what the index stores for it.</p>",
                    i
                )
            })
            .collect();
        format!(
            r#"<html lang="en"><head><title>Guide</title>
            <script type="application/ld+json">{{broken</script></head>
            <body><main><h1>Guide</h1>{}<ul><li>First</li></ul></main>
            <a href="/docs/next">Next docs</a></body></html>"#,
            body
        )
    }

    fn url() -> Url {
        Url::parse("https://example.com/guide").unwrap()
    }

    #[test]
    fn test_document_kind() {
        assert_eq!(DocumentKind::from_content_type(None), Some(DocumentKind::Html));
        assert_eq!(
            DocumentKind::from_content_type(Some("text/html")),
            Some(DocumentKind::Html)
        );
        assert_eq!(
            DocumentKind::from_content_type(Some("text/plain")),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(DocumentKind::from_content_type(Some("image/png")), None);
        assert_eq!(DocumentKind::from_content_type(Some("application/pdf")), None);
    }

    #[test]
    fn test_html_accepted_and_enriched() {
        let mut scorer = QualityScorer::default();
        let output = pipeline(20).run(&url(), &page(8), DocumentKind::Html, &mut scorer);

        assert!(output.is_accepted());
        assert_eq!(output.content.title.as_deref(), Some("Guide"));
        assert_eq!(output.content.structure.headings, 1);
        assert_eq!(output.content.links.len(), 1);
        assert!(output.content.links[0].internal);
        assert_eq!(output.content.metadata.kind(), "html");

        // The broken JSON-LD block is reported but does not stop the page
        assert_eq!(output.stage_errors.len(), 1);

        let PipelineOutcome::Accepted(enrichment) = &output.outcome else {
            panic!("expected accepted page");
        };
        assert!(enrichment.keywords.contains(&"page".to_string()));
        assert!(enrichment.reading_ease.is_some());
    }

    #[test]
    fn test_images_and_links_kept_in_metadata() {
        let paragraphs: String = (0..6)
            .map(|i| format!("<p>This chart explains how the crawler handled batch {} last week.</p>", i))
            .collect();
        let body = format!(
            r#"<html lang="en"><head><title>Gallery</title></head><body><main>
            <h1>Gallery</h1>{}
            <img src="/img/chart.png" alt="Throughput chart" width="640" height="480">
            <table><tr><td>42</td></tr></table>
            <a href="/docs/next">Next docs</a>
            <a href="https://other.org/paper">Paper</a>
            </main></body></html>"#,
            paragraphs
        );
        let mut scorer = QualityScorer::default();
        let output = pipeline(20).run(&url(), &body, DocumentKind::Html, &mut scorer);

        let StructuredMetadata::Html(meta) = &output.content.metadata else {
            panic!("expected html metadata");
        };
        assert_eq!(meta.images.len(), 1);
        assert_eq!(meta.images[0].url.as_str(), "https://example.com/img/chart.png");
        assert_eq!(meta.images[0].alt.as_deref(), Some("Throughput chart"));
        assert_eq!(meta.images[0].width, Some(640));
        assert_eq!(meta.tables, 1);
        assert!(meta.internal_links().any(|l| l.url.path() == "/docs/next"));
        assert_eq!(meta.external_links().count(), 1);
        assert_eq!(meta.links, output.content.links);
    }

    #[test]
    fn test_short_page_filtered() {
        let mut scorer = QualityScorer::default();
        let output = pipeline(500).run(&url(), &page(2), DocumentKind::Html, &mut scorer);

        assert!(!output.is_accepted());
        assert!(matches!(
            output.outcome,
            PipelineOutcome::Filtered(FilterRejection::TooShort { .. })
        ));
        // Scored before filtering, so it is in the duplicate window
        assert_eq!(scorer.detector().window_len(), 1);
    }

    #[test]
    fn test_plain_text_document() {
        let mut scorer = QualityScorer::default();
        let body = "Release notes\n\n- Faster fetches and the new index\n- Fewer retries for the crawler\n";
        let output = pipeline(5).run(&url(), body, DocumentKind::PlainText, &mut scorer);

        assert_eq!(output.content.metadata.kind(), "plain_text");
        assert_eq!(output.content.title.as_deref(), Some("Release notes"));
        assert_eq!(output.content.structure.lists, 1);
        assert!(output.content.links.is_empty());
        assert!(output.is_accepted());
    }

    #[test]
    fn test_repeat_document_is_exact_duplicate() {
        let mut scorer = QualityScorer::default();
        let p = pipeline(20);
        p.run(&url(), &page(8), DocumentKind::Html, &mut scorer);
        let second = p.run(&url(), &page(8), DocumentKind::Html, &mut scorer);
        assert!(second.quality.metrics.is_exact_duplicate());
    }
}
