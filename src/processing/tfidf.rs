//! Corpus-relative TF-IDF vectors

use crate::error::{AtsGateError, Result};
use crate::processing::embeddings::{cosine_similarity, l2_normalize};
use crate::processing::text_processor::TextProcessor;
use std::collections::{BTreeMap, HashSet};

/// TF-IDF fitted on a corpus of at least two documents. Uses smoothed idf,
/// `ln((1 + n) / (1 + df)) + 1`, and L2-normalized output vectors.
pub struct TfIdfVectorizer {
    processor: TextProcessor,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f32>,
}

impl TfIdfVectorizer {
    pub fn fit(corpus: &[&str]) -> Result<Self> {
        if corpus.len() < 2 {
            return Err(AtsGateError::InsufficientCorpus(format!(
                "TF-IDF needs at least 2 documents, got {}",
                corpus.len()
            )));
        }

        let processor = TextProcessor::new();
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for document in corpus {
            let unique: HashSet<String> = processor.tokenize(document).into_iter().collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let n = corpus.len() as f32;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term, index);
            idf.push(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0);
        }

        Ok(Self {
            processor,
            vocabulary,
            idf,
        })
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Terms outside the fitted vocabulary are ignored.
    pub fn transform(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.vocabulary.len()];
        for token in self.processor.tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&token) {
                vector[index] += 1.0;
            }
        }
        for (value, idf) in vector.iter_mut().zip(&self.idf) {
            *value *= idf;
        }
        l2_normalize(&mut vector);
        vector
    }

    /// Fit on the pair and return their cosine, clamped to [0, 1]
    pub fn pair_similarity(a: &str, b: &str) -> Result<f32> {
        let vectorizer = Self::fit(&[a, b])?;
        if vectorizer.vocabulary_size() == 0 {
            return Ok(0.0);
        }
        let similarity = cosine_similarity(&vectorizer.transform(a), &vectorizer.transform(b))?;
        Ok(similarity.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_requires_two_documents() {
        let err = TfIdfVectorizer::fit(&["only one"]).err().unwrap();
        assert!(matches!(err, AtsGateError::InsufficientCorpus(_)));
    }

    #[test]
    fn test_shared_terms_weigh_less() {
        let vectorizer = TfIdfVectorizer::fit(&["rust backend", "rust frontend"]).unwrap();
        let vector = vectorizer.transform("rust backend");

        let rust = vectorizer.vocabulary["rust"];
        let backend = vectorizer.vocabulary["backend"];
        assert!(vector[rust] < vector[backend]);
    }

    #[test]
    fn test_pair_similarity_bounds() {
        assert!((TfIdfVectorizer::pair_similarity("rust developer", "rust developer").unwrap() - 1.0).abs() < 1e-5);
        assert_eq!(TfIdfVectorizer::pair_similarity("rust developer", "oil painting").unwrap(), 0.0);
        assert_eq!(TfIdfVectorizer::pair_similarity("", "").unwrap(), 0.0);
    }
}
