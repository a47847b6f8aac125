//! Enrichment stage: keywords, topics, sentiment and readability

use crate::extraction::text::{is_stop_word, sentences, syllables, words};
use crate::extraction::StageError;
use std::collections::HashMap;

/// Number of keywords kept per page
pub const MAX_KEYWORDS: usize = 10;

/// Keyword hits needed before a topic is assigned
const TOPIC_MIN_HITS: usize = 2;

const TOPICS: &[(&str, &[&str])] = &[
    (
        "technology",
        &[
            "software", "code", "api", "programming", "developer", "server", "cloud", "database",
            "computer", "algorithm", "framework", "rust", "library",
        ],
    ),
    (
        "science",
        &[
            "research", "study", "scientists", "experiment", "physics", "biology", "chemistry",
            "hypothesis", "laboratory",
        ],
    ),
    (
        "business",
        &[
            "market", "company", "revenue", "business", "customers", "sales", "finance", "investors",
            "startup", "pricing",
        ],
    ),
    (
        "health",
        &[
            "health", "medical", "patients", "disease", "treatment", "doctor", "clinical", "symptoms",
        ],
    ),
    (
        "education",
        &[
            "students", "learning", "course", "university", "school", "teaching", "lesson",
            "curriculum", "tutorial",
        ],
    ),
    (
        "politics",
        &[
            "government", "policy", "election", "president", "minister", "parliament", "vote",
            "legislation",
        ],
    ),
];

const POSITIVE: &[&str] = &[
    "good", "great", "excellent", "amazing", "best", "better", "easy", "fast", "reliable",
    "love", "helpful", "improved", "success", "successful", "benefit", "positive", "powerful",
    "simple", "happy", "effective",
];

const NEGATIVE: &[&str] = &[
    "bad", "poor", "terrible", "worst", "worse", "difficult", "slow", "broken", "hate", "bug",
    "error", "fail", "failure", "failed", "problem", "negative", "crash", "confusing", "risk",
    "unfortunately",
];

/// Output of the enrichment stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub keywords: Vec<String>,
    pub topics: Vec<String>,

    /// In `[-1, 1]`
    pub sentiment: Option<f64>,

    /// Flesch reading ease, clamped to `[0, 100]`
    pub reading_ease: Option<f64>,
}

/// Runs every enricher, collecting failures instead of stopping at them
pub fn enrich(text: &str, errors: &mut Vec<StageError>) -> Enrichment {
    let tokens: Vec<String> = words(text).iter().map(|w| w.to_lowercase()).collect();

    let keywords = extract_keywords(&tokens, MAX_KEYWORDS);
    let topics = categorize(&tokens);

    let sentiment = record(errors, sentiment(&tokens));
    let reading_ease = record(errors, reading_ease(text));

    Enrichment {
        keywords,
        topics,
        sentiment,
        reading_ease,
    }
}

fn record<T>(errors: &mut Vec<StageError>, result: Result<T, StageError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("{}", e);
            errors.push(e);
            None
        }
    }
}

/// Most frequent non-stop-words, ties broken alphabetically
pub fn extract_keywords(tokens: &[String], limit: usize) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        if token.chars().count() < 3
            || is_stop_word(token)
            || token.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// Topics whose keyword buckets the text hits at least twice, strongest first
pub fn categorize(tokens: &[String]) -> Vec<String> {
    let mut scored: Vec<(&str, usize)> = TOPICS
        .iter()
        .map(|(topic, bucket)| {
            let hits = tokens
                .iter()
                .filter(|token| bucket.contains(&token.as_str()))
                .count();
            (*topic, hits)
        })
        .filter(|(_, hits)| *hits >= TOPIC_MIN_HITS)
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().map(|(topic, _)| topic.to_string()).collect()
}

/// Lexicon sentiment: `(positive − negative) / (positive + negative)`
///
/// Text without any lexicon words scores 0.
pub fn sentiment(tokens: &[String]) -> Result<f64, StageError> {
    if tokens.is_empty() {
        return Err(StageError::Enrich {
            step: "sentiment",
            message: "empty text".to_string(),
        });
    }

    let positive = tokens.iter().filter(|t| POSITIVE.contains(&t.as_str())).count();
    let negative = tokens.iter().filter(|t| NEGATIVE.contains(&t.as_str())).count();
    let total = positive + negative;
    if total == 0 {
        return Ok(0.0);
    }
    Ok((positive as f64 - negative as f64) / total as f64)
}

/// Flesch reading ease: `206.835 − 1.015·(words/sentences) − 84.6·(syllables/words)`
pub fn reading_ease(text: &str) -> Result<f64, StageError> {
    let sentence_count = sentences(text).len();
    let tokens = words(text);
    if sentence_count == 0 || tokens.is_empty() {
        return Err(StageError::Enrich {
            step: "readability",
            message: "no sentences to score".to_string(),
        });
    }

    let syllable_count: usize = tokens.iter().map(|w| syllables(w)).sum();
    let words_per_sentence = tokens.len() as f64 / sentence_count as f64;
    let syllables_per_word = syllable_count as f64 / tokens.len() as f64;
    let score = 206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word;
    Ok(score.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        words(text).iter().map(|w| w.to_lowercase()).collect()
    }

    #[test]
    fn test_keywords_by_frequency() {
        let t = tokens("Rust crawler. The crawler fetches pages; pages feed the index. Crawler!");
        let keywords = extract_keywords(&t, 3);
        assert_eq!(keywords, vec!["crawler", "pages", "feed"]);
    }

    #[test]
    fn test_keywords_skip_numbers_and_short_words() {
        let t = tokens("an ox 2024 2024 2024 go library");
        assert_eq!(extract_keywords(&t, 10), vec!["library"]);
    }

    #[test]
    fn test_topics() {
        let t = tokens("The API server talks to the database. Students learn code in a course.");
        let topics = categorize(&t);
        assert_eq!(topics.first().map(String::as_str), Some("technology"));
        assert!(topics.contains(&"education".to_string()));
        assert!(!topics.contains(&"health".to_string()));
    }

    #[test]
    fn test_sentiment() {
        assert_eq!(sentiment(&tokens("great and reliable")).unwrap(), 1.0);
        assert_eq!(sentiment(&tokens("a broken, slow build")).unwrap(), -1.0);
        assert_eq!(sentiment(&tokens("good but slow")).unwrap(), 0.0);
        assert_eq!(sentiment(&tokens("neutral words only")).unwrap(), 0.0);
        assert!(sentiment(&[]).is_err());
    }

    #[test]
    fn test_reading_ease() {
        let easy = reading_ease("The cat sat. The dog ran. We had fun.").unwrap();
        let hard = reading_ease(
            "Institutional interoperability necessitates comprehensive organizational standardization methodologies.",
        )
        .unwrap();
        assert!(easy > 90.0);
        assert!(hard < 20.0);
        assert!(reading_ease("   ").is_err());
    }

    #[test]
    fn test_enrich_collects_errors() {
        let mut errors = Vec::new();
        let enrichment = enrich("", &mut errors);
        assert!(enrichment.keywords.is_empty());
        assert!(enrichment.sentiment.is_none());
        assert!(enrichment.reading_ease.is_none());
        assert_eq!(errors.len(), 2);
    }
}
