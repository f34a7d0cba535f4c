//! Explicitly constructed bundle of model collaborators
//!
//! Every consumer (scoring engine, interview scorer, document engine, video
//! stage) receives the provider at construction; nothing is loaded lazily.

use crate::config::Config;
use crate::documents::features::OcrEngine;
use crate::emotion::fusion::EmotionClassifier;
use crate::emotion::stream::EmotionClassifiers;
use crate::error::{Alert, AlertKind, Result};
use crate::processing::embeddings::{
    EmbeddingBackend, EmbeddingProvider, HashingBackend, Model2VecBackend, SEMANTIC,
};
use crate::processing::entities::{EntityExtractor, EntityModel};
use crate::processing::sentiment::{LexiconSentiment, SentimentModel};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

const LIGHTWEIGHT_DIMENSION: usize = 256;
const LIGHTWEIGHT_MAX_TOKENS: usize = 512;

pub struct ModelProvider {
    pub extractor: EntityExtractor,
    pub embeddings: EmbeddingProvider,
    pub sentiment: Arc<dyn SentimentModel>,
    pub ocr: Option<Arc<dyn OcrEngine>>,
    pub emotion: EmotionClassifiers,
    /// Degradations noticed while loading
    pub alerts: Vec<Alert>,
}

impl ModelProvider {
    pub fn builder() -> ModelProviderBuilder {
        ModelProviderBuilder::default()
    }

    /// Hashing embeddings, lexicon sentiment and pattern-only entities.
    pub fn lightweight() -> Self {
        Self {
            extractor: EntityExtractor::new(None).expect("built-in vocabulary compiles"),
            embeddings: EmbeddingProvider::new().with_backend(
                SEMANTIC,
                Arc::new(HashingBackend::new(LIGHTWEIGHT_DIMENSION, LIGHTWEIGHT_MAX_TOKENS)),
            ),
            sentiment: Arc::new(LexiconSentiment::new()),
            ocr: None,
            emotion: EmotionClassifiers::default(),
            alerts: Vec::new(),
        }
    }

    /// Load the semantic model named in the configuration, falling back to the
    /// hashing encoder when it is missing or unreadable.
    pub fn from_config(config: &Config) -> Result<Self> {
        let model_path = config.semantic_model_path();
        Self::builder()
            .semantic_model_path(model_path)
            .max_tokens(config.models.max_tokens)
            .fallback_dimension(config.models.fallback_dimension)
            .build()
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }
}

#[derive(Default)]
pub struct ModelProviderBuilder {
    entity_model: Option<Arc<dyn EntityModel>>,
    semantic: Option<Arc<dyn EmbeddingBackend>>,
    semantic_model_path: Option<PathBuf>,
    extra_backends: Vec<(String, Arc<dyn EmbeddingBackend>)>,
    sentiment: Option<Arc<dyn SentimentModel>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    image_emotion: Option<Arc<dyn EmotionClassifier>>,
    landmark_emotion: Option<Arc<dyn EmotionClassifier>>,
    max_tokens: Option<usize>,
    fallback_dimension: Option<usize>,
}

impl ModelProviderBuilder {
    pub fn entity_model(mut self, model: Arc<dyn EntityModel>) -> Self {
        self.entity_model = Some(model);
        self
    }

    /// Use this backend for the semantic slot instead of loading from disk
    pub fn semantic_backend(mut self, backend: Arc<dyn EmbeddingBackend>) -> Self {
        self.semantic = Some(backend);
        self
    }

    pub fn semantic_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.semantic_model_path = Some(path.into());
        self
    }

    pub fn embedding_backend(mut self, slot: impl Into<String>, backend: Arc<dyn EmbeddingBackend>) -> Self {
        self.extra_backends.push((slot.into(), backend));
        self
    }

    pub fn sentiment(mut self, model: Arc<dyn SentimentModel>) -> Self {
        self.sentiment = Some(model);
        self
    }

    pub fn ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn image_emotion(mut self, classifier: Arc<dyn EmotionClassifier>) -> Self {
        self.image_emotion = Some(classifier);
        self
    }

    pub fn landmark_emotion(mut self, classifier: Arc<dyn EmotionClassifier>) -> Self {
        self.landmark_emotion = Some(classifier);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn fallback_dimension(mut self, dimension: usize) -> Self {
        self.fallback_dimension = Some(dimension);
        self
    }

    pub fn build(self) -> Result<ModelProvider> {
        let mut alerts = Vec::new();
        let max_tokens = self.max_tokens.unwrap_or(LIGHTWEIGHT_MAX_TOKENS);
        let fallback_dimension = self.fallback_dimension.unwrap_or(LIGHTWEIGHT_DIMENSION);

        let semantic: Arc<dyn EmbeddingBackend> = match (self.semantic, self.semantic_model_path) {
            (Some(backend), _) => backend,
            (None, Some(path)) if path.exists() => match Model2VecBackend::load(&path, max_tokens) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    warn!("Falling back to hashing embeddings: {}", e);
                    alerts.push(Alert::new(
                        AlertKind::ExtractionDegraded,
                        format!("semantic model unusable, using hashing encoder: {}", e),
                    ));
                    Arc::new(HashingBackend::new(fallback_dimension, max_tokens))
                }
            },
            (None, path) => {
                let location = path
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "none configured".to_string());
                info!("No semantic model at {}, using hashing embeddings", location);
                alerts.push(Alert::new(
                    AlertKind::ExtractionDegraded,
                    format!("semantic model not installed ({}), using hashing encoder", location),
                ));
                Arc::new(HashingBackend::new(fallback_dimension, max_tokens))
            }
        };

        let mut embeddings = EmbeddingProvider::new().with_backend(SEMANTIC, semantic);
        for (slot, backend) in self.extra_backends {
            embeddings = embeddings.with_backend(slot, backend);
        }

        Ok(ModelProvider {
            extractor: EntityExtractor::new(self.entity_model)?,
            embeddings,
            sentiment: self.sentiment.unwrap_or_else(|| Arc::new(LexiconSentiment::new())),
            ocr: self.ocr,
            emotion: EmotionClassifiers {
                image: self.image_emotion,
                landmark: self.landmark_emotion,
            },
            alerts,
        })
    }
}
