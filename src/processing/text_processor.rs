//! Text normalization, tokenization and token-set similarity

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

pub struct TextProcessor {
    stop_words: HashSet<&'static str>,
}

static WHITESPACE: OnceLock<Regex> = OnceLock::new();

const STOP_WORDS: &[&str] = &[
    // english
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "will",
    "with", "we", "you", "your", "our", "they", "their", "i", "my", "me", "do", "did", "so",
    "but", "if", "then", "than", "into", "about", "can", "also", "been", "being", "not",
    "all", "any", "such", "which", "who", "what", "when", "where", "how",
    // french
    "le", "la", "les", "de", "des", "du", "un", "une", "et", "en", "au", "aux", "pour",
    "par", "sur", "dans", "est", "que", "qui", "ou", "avec", "ce", "ces", "se", "sa", "son",
];

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextProcessor {
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Collapse whitespace and map typographic punctuation to ASCII.
    pub fn normalize(&self, text: &str) -> String {
        let ws = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
        let collapsed = ws.replace_all(text, " ");
        collapsed
            .trim()
            .chars()
            .map(|c| match c {
                '\u{2018}' | '\u{2019}' => '\'',
                '\u{201C}' | '\u{201D}' => '"',
                '\u{2013}' | '\u{2014}' => '-',
                '\u{2026}' => '.',
                _ => c,
            })
            .collect()
    }

    /// Lowercased content tokens with stop words and single characters removed
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .map(|w| w.to_lowercase())
            .filter(|w| w.chars().count() > 1)
            .filter(|w| !self.stop_words.contains(w.as_str()))
            .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
            .collect()
    }

    pub fn token_set(&self, text: &str) -> HashSet<String> {
        self.tokenize(text).into_iter().collect()
    }

    pub fn split_sentences(&self, text: &str) -> Vec<String> {
        text.unicode_sentences()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Number of unicode words, stop words included
    pub fn word_count(text: &str) -> usize {
        text.unicode_words().count()
    }

    /// Keep the first `max_tokens` whitespace-separated tokens.
    pub fn truncate_tokens(text: &str, max_tokens: usize) -> String {
        let mut tokens = text.split_whitespace();
        let kept: Vec<&str> = tokens.by_ref().take(max_tokens).collect();
        kept.join(" ")
    }

    /// Jaccard similarity over content tokens; two empty texts score 0.
    pub fn text_similarity(&self, text1: &str, text2: &str) -> f32 {
        jaccard(&self.token_set(text1), &self.token_set(text2))
    }
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
