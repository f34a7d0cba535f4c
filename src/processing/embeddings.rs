//! Embedding backends and the provider that routes texts to them

use crate::error::{AtsGateError, Result};
use crate::processing::text_processor::TextProcessor;
use log::{debug, info};
use model2vec_rs::model::StaticModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Slot name of the sentence-level semantic backend
pub const SEMANTIC: &str = "semantic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Lexical,
    Semantic,
}

pub trait EmbeddingBackend: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> BackendKind;
    fn dimension(&self) -> usize;
    fn max_tokens(&self) -> usize;
    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Model2Vec static embeddings loaded from a local directory
pub struct Model2VecBackend {
    model: StaticModel,
    model_name: String,
    dimension: usize,
    max_tokens: usize,
}

impl Model2VecBackend {
    pub fn load(model_path: &Path, max_tokens: usize) -> Result<Self> {
        let start_time = Instant::now();
        info!("Loading Model2Vec embedding model from: {}", model_path.display());

        let model = StaticModel::from_pretrained(model_path, None, None, None)
            .map_err(|e| AtsGateError::ModelLoading(format!("Failed to load model: {}", e)))?;

        let dimension = model.encode_single("dimension probe").len();
        if dimension == 0 {
            return Err(AtsGateError::ModelLoading(format!(
                "Model at {} produced empty embeddings",
                model_path.display()
            )));
        }

        info!("Model loaded in {:.2?} ({} dimensions)", start_time.elapsed(), dimension);

        Ok(Self {
            model,
            model_name: model_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "model2vec".to_string()),
            dimension,
            max_tokens,
        })
    }
}

impl EmbeddingBackend for Model2VecBackend {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Semantic
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.model
            .encode_with_args(&[text.to_string()], Some(self.max_tokens), 1)
            .into_iter()
            .next()
            .ok_or_else(|| AtsGateError::Embedding("Model returned no embedding".to_string()))
    }
}

/// Signed feature hashing over word tokens and their character trigrams.
///
/// Used when no pretrained model is installed. Deterministic across runs.
pub struct HashingBackend {
    dimension: usize,
    max_tokens: usize,
    processor: TextProcessor,
}

impl HashingBackend {
    pub fn new(dimension: usize, max_tokens: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            max_tokens,
            processor: TextProcessor::new(),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let index = (hash % self.dimension as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

impl EmbeddingBackend for HashingBackend {
    fn name(&self) -> &str {
        "hashing"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Semantic
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in self.processor.tokenize(text) {
            self.add_feature(&mut vector, &token, 1.0);
            let chars: Vec<char> = format!("<{}>", token).chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, &trigram, 0.5);
            }
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Cosine similarity in [-1, 1]; a zero vector scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(AtsGateError::Embedding(format!(
            "Embedding dimensions don't match: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        Ok(0.0)
    } else {
        Ok((dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0))
    }
}

/// Named embedding backends. Texts are truncated to each backend's token
/// window, keeping the beginning; empty texts map to zero vectors.
#[derive(Clone, Default)]
pub struct EmbeddingProvider {
    backends: BTreeMap<String, Arc<dyn EmbeddingBackend>>,
}

impl EmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, slot: impl Into<String>, backend: Arc<dyn EmbeddingBackend>) -> Self {
        self.backends.insert(slot.into(), backend);
        self
    }

    pub fn backend(&self, slot: &str) -> Result<&Arc<dyn EmbeddingBackend>> {
        self.backends
            .get(slot)
            .ok_or_else(|| AtsGateError::Configuration(format!("Unknown embedding backend: {}", slot)))
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn embed(&self, text: &str, slot: &str) -> Result<Vec<f32>> {
        let backend = self.backend(slot)?;

        if text.trim().is_empty() {
            return Ok(vec![0.0; backend.dimension()]);
        }

        let word_count = text.split_whitespace().count();
        let embedding = if word_count > backend.max_tokens() {
            debug!(
                "Truncating {} tokens to {} for backend {}",
                word_count,
                backend.max_tokens(),
                backend.name()
            );
            backend.encode(&TextProcessor::truncate_tokens(text, backend.max_tokens()))?
        } else {
            backend.encode(text)?
        };

        if embedding.len() != backend.dimension() {
            return Err(AtsGateError::Embedding(format!(
                "Backend {} returned {} dimensions, expected {}",
                backend.name(),
                embedding.len(),
                backend.dimension()
            )));
        }
        Ok(embedding)
    }

    /// Embed with every registered backend
    pub fn embed_all(&self, text: &str) -> Result<BTreeMap<String, Vec<f32>>> {
        self.backends
            .keys()
            .map(|slot| Ok((slot.clone(), self.embed(text, slot)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> EmbeddingProvider {
        EmbeddingProvider::new().with_backend(SEMANTIC, Arc::new(HashingBackend::new(128, 8)))
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).unwrap().abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]).unwrap(), 0.0);
        assert!(cosine_similarity(&a, &[1.0]).is_err());
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedding = provider().embed("   ", SEMANTIC).unwrap();
        assert_eq!(embedding.len(), 128);
        assert!(embedding.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_unknown_backend_is_configuration_error() {
        let err = provider().embed("rust", "bert").unwrap_err();
        assert!(matches!(err, AtsGateError::Configuration(_)));
    }

    #[test]
    fn test_truncation_keeps_first_tokens() {
        let provider = provider();
        let head = "alpha beta gamma delta epsilon zeta eta theta";
        let long = format!("{} iota kappa lambda mu", head);

        let a = provider.embed(head, SEMANTIC).unwrap();
        let b = provider.embed(&long, SEMANTIC).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hashing_backend_is_deterministic_and_discriminative() {
        let provider = provider();
        let a = provider.embed("rust systems programming", SEMANTIC).unwrap();
        let b = provider.embed("rust systems programming", SEMANTIC).unwrap();
        let c = provider.embed("watercolor painting workshop", SEMANTIC).unwrap();

        assert_eq!(a, b);
        let same = cosine_similarity(&a, &b).unwrap();
        let different = cosine_similarity(&a, &c).unwrap();
        assert!((same - 1.0).abs() < 1e-5);
        assert!(different < same);
    }
}
