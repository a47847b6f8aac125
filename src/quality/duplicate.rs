use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};

/// Recent pages kept for near-duplicate comparison
pub const DEFAULT_WINDOW: usize = 50;

/// SHA-256 of the text with whitespace runs collapsed
pub fn content_hash(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Lowercased word set used for Jaccard comparison
pub fn word_set(text: &str) -> HashSet<String> {
    crate::extraction::text::words(text)
        .into_iter()
        .map(|w| w.to_lowercase())
        .collect()
}

/// Jaccard index of two sets, 0 when both are empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Exact and near-duplicate detection for one session
///
/// Exact matches use every content hash seen this session. Near-duplicate
/// similarity only looks at the most recent `window` pages.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    hashes: HashSet<String>,
    recent: VecDeque<HashSet<String>>,
    window: usize,
}

impl DuplicateDetector {
    pub fn new(window: usize) -> Self {
        Self {
            hashes: HashSet::new(),
            recent: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Similarity of a page to what has been seen
    ///
    /// 1.0 for an exact hash match, otherwise the highest Jaccard overlap with
    /// a page in the recent window.
    pub fn similarity(&self, hash: &str, words: &HashSet<String>) -> f64 {
        if self.hashes.contains(hash) {
            return 1.0;
        }
        self.recent
            .iter()
            .map(|seen| jaccard(words, seen))
            .fold(0.0, f64::max)
    }

    /// Adds a page to the seen set, evicting the oldest beyond the window
    pub fn remember(&mut self, hash: String, words: HashSet<String>) {
        self.hashes.insert(hash);
        if self.window == 0 {
            return;
        }
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(words);
    }

    /// Pages currently in the comparison window
    pub fn window_len(&self) -> usize {
        self.recent.len()
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
