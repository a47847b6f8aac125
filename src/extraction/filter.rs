use crate::config::PipelineConfig;
use crate::extraction::text::words;
use crate::extraction::{ExtractedContent, StageError};
use std::fmt;

/// Stop words per language used by the language heuristic
const LANGUAGE_MARKERS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "is", "of", "to", "in", "that", "it", "with", "for", "this", "are"]),
    ("es", &["el", "la", "de", "que", "y", "los", "las", "en", "por", "una", "para", "es"]),
    ("fr", &["le", "la", "les", "de", "et", "des", "est", "une", "pour", "que", "dans", "du"]),
    ("de", &["der", "die", "und", "das", "ist", "nicht", "mit", "ein", "eine", "zu", "den", "von"]),
    ("it", &["il", "di", "che", "e", "la", "per", "non", "una", "sono", "gli", "del", "della"]),
    ("pt", &["o", "de", "que", "e", "do", "da", "em", "um", "para", "os", "uma", "não"]),
];

/// Share of tokens that must be marker words before a language is claimed
const MIN_MARKER_SHARE: f64 = 0.05;

/// Why a page was filtered out of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum FilterRejection {
    TooShort { words: usize, min: usize },
    LowQuality { score: f64, min: f64 },
    Language { detected: String },
}

impl fmt::Display for FilterRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { words, min } => write!(f, "too short: {} words (min {})", words, min),
            Self::LowQuality { score, min } => {
                write!(f, "low quality: {:.2} (min {:.2})", score, min)
            }
            Self::Language { detected } => write!(f, "language not allowed: {}", detected),
        }
    }
}

/// The pipeline's filter stage
#[derive(Debug, Clone)]
pub struct ContentFilter {
    min_word_count: usize,
    min_quality_score: f64,
    allowed_languages: Vec<String>,
}

impl ContentFilter {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min_word_count: config.min_word_count,
            min_quality_score: config.min_quality_score,
            allowed_languages: config
                .allowed_languages
                .iter()
                .map(|lang| lang.to_lowercase())
                .collect(),
        }
    }

    /// Runs the filters in order, stopping at the first rejection
    ///
    /// A page whose language cannot be determined is let through; the failed
    /// detection is reported in `errors`.
    pub fn check(
        &self,
        content: &ExtractedContent,
        quality: f64,
        errors: &mut Vec<StageError>,
    ) -> Result<(), FilterRejection> {
        if content.word_count < self.min_word_count {
            return Err(FilterRejection::TooShort {
                words: content.word_count,
                min: self.min_word_count,
            });
        }

        if quality < self.min_quality_score {
            return Err(FilterRejection::LowQuality {
                score: quality,
                min: self.min_quality_score,
            });
        }

        if self.allowed_languages.is_empty() {
            return Ok(());
        }

        let language = match content.metadata.language() {
            Some(declared) => Ok(declared.to_string()),
            None => detect_language(&content.text),
        };

        match language {
            Ok(lang) if self.allowed_languages.iter().any(|allowed| *allowed == lang) => Ok(()),
            Ok(lang) => Err(FilterRejection::Language { detected: lang }),
            Err(e) => {
                tracing::debug!("{}", e);
                errors.push(e);
                Ok(())
            }
        }
    }
}

/// Guesses a language from stop-word frequencies
///
/// Returns the language whose marker words make up the largest share of the
/// tokens, provided that share reaches 5%.
pub fn detect_language(text: &str) -> Result<String, StageError> {
    let tokens: Vec<String> = words(text).iter().map(|w| w.to_lowercase()).collect();
    if tokens.is_empty() {
        return Err(StageError::Filter {
            step: "language",
            message: "no words to detect language from".to_string(),
        });
    }

    let best = LANGUAGE_MARKERS
        .iter()
        .map(|(lang, markers)| {
            let hits = tokens
                .iter()
                .filter(|token| markers.contains(&token.as_str()))
                .count();
            (*lang, hits)
        })
        .max_by_key(|(_, hits)| *hits);

    match best {
        Some((lang, hits)) if hits as f64 / tokens.len() as f64 >= MIN_MARKER_SHARE => {
            Ok(lang.to_string())
        }
        _ => Err(StageError::Filter {
            step: "language",
            message: "language could not be determined".to_string(),
        }),
    }
}
