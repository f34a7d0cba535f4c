//! Keyword-based document type classification

use crate::error::{AtsGateError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strsim::levenshtein;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Bac,
    Cin,
    Master,
    Doctorat,
    Permis,
    Licence,
    Unknown,
}

impl DocumentType {
    /// Recognized types in registration order; ties resolve to the earliest.
    pub const KNOWN: [DocumentType; 6] = [
        DocumentType::Bac,
        DocumentType::Cin,
        DocumentType::Master,
        DocumentType::Doctorat,
        DocumentType::Permis,
        DocumentType::Licence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Bac => "bac",
            DocumentType::Cin => "cin",
            DocumentType::Master => "master",
            DocumentType::Doctorat => "doctorat",
            DocumentType::Permis => "permis",
            DocumentType::Licence => "licence",
            DocumentType::Unknown => "unknown",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            DocumentType::Bac => &["baccalauréat", "diplôme", "académie", "mention"],
            DocumentType::Cin => &["carte", "identité", "nationale", "cin", "cni"],
            DocumentType::Master => &["master", "magistère", "université", "faculté"],
            DocumentType::Doctorat => &["doctorat", "thèse", "phd", "docteur"],
            DocumentType::Permis => &["permis", "conduire", "transport", "véhicule"],
            DocumentType::Licence => &["licence", "bachelor", "université", "grade"],
            DocumentType::Unknown => &[],
        }
    }

    pub fn is_known(&self) -> bool {
        *self != DocumentType::Unknown
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = AtsGateError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        Self::KNOWN
            .iter()
            .chain(std::iter::once(&DocumentType::Unknown))
            .copied()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| AtsGateError::Configuration(format!("Unknown document type: {}", s)))
    }
}

/// Minimum keyword length for OCR-tolerant matching
const FUZZY_MIN_CHARS: usize = 6;
const FUZZY_THRESHOLD: f32 = 0.85;

pub struct DocumentClassifier {
    fuzzy_threshold: f32,
}

impl Default for DocumentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentClassifier {
    pub fn new() -> Self {
        Self {
            fuzzy_threshold: FUZZY_THRESHOLD,
        }
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f32) -> Self {
        self.fuzzy_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Number of keywords of `doc_type` found in `text`
    pub fn keyword_hits(&self, text: &str, doc_type: DocumentType) -> usize {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.unicode_words().collect();
        doc_type
            .keywords()
            .iter()
            .filter(|keyword| lowered.contains(*keyword) || self.fuzzy_hit(keyword, &words))
            .count()
    }

    /// Near-miss spellings of long keywords still count, e.g. accents lost to OCR
    fn fuzzy_hit(&self, keyword: &str, words: &[&str]) -> bool {
        let keyword_len = keyword.chars().count();
        if keyword_len < FUZZY_MIN_CHARS {
            return false;
        }
        words.iter().any(|word| {
            let max_len = keyword_len.max(word.chars().count());
            let similarity = 1.0 - levenshtein(word, keyword) as f32 / max_len as f32;
            similarity >= self.fuzzy_threshold
        })
    }

    /// Type with the most keyword hits; `Unknown` when nothing matches.
    pub fn classify(&self, text: &str) -> DocumentType {
        let mut best = (DocumentType::Unknown, 0usize);
        for doc_type in DocumentType::KNOWN {
            let hits = self.keyword_hits(text, doc_type);
            if hits > best.1 {
                best = (doc_type, hits);
            }
        }
        debug!("Classified document as {} ({} keyword hits)", best.0, best.1);
        best.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_identity_card() {
        let classifier = DocumentClassifier::new();
        let text = "ROYAUME DU MAROC Carte Nationale d'Identité Electronique";
        assert_eq!(classifier.classify(text), DocumentType::Cin);
    }

    #[test]
    fn test_no_keywords_is_unknown() {
        let classifier = DocumentClassifier::new();
        assert_eq!(classifier.classify("grocery receipt 12 eggs"), DocumentType::Unknown);
        assert_eq!(classifier.classify(""), DocumentType::Unknown);
    }

    #[test]
    fn test_tie_prefers_first_registered() {
        let classifier = DocumentClassifier::new();
        // "université" counts for both master and licence
        assert_eq!(classifier.classify("Université Hassan II"), DocumentType::Master);
    }

    #[test]
    fn test_fuzzy_match_tolerates_lost_accents() {
        let classifier = DocumentClassifier::new();
        assert_eq!(classifier.keyword_hits("Universite Mohammed V, Faculte des Sciences", DocumentType::Master), 2);
        assert_eq!(classifier.keyword_hits("Baccalaureat Sciences", DocumentType::Bac), 1);
        assert_eq!(classifier.classify("Baccalaureat Sciences"), DocumentType::Bac);
    }

    #[test]
    fn test_parse_document_type() {
        assert_eq!("CIN".parse::<DocumentType>().unwrap(), DocumentType::Cin);
        assert_eq!("unknown".parse::<DocumentType>().unwrap(), DocumentType::Unknown);
        assert!(matches!(
            "passport".parse::<DocumentType>(),
            Err(AtsGateError::Configuration(_))
        ));
    }
}
