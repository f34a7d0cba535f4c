//! Document classification and authentication against a reference corpus

pub mod authenticator;
pub mod classifier;
pub mod features;
pub mod reference_store;

pub use authenticator::{AuthenticationResult, DocumentAuthenticator, AUTHENTICITY_THRESHOLD};
pub use classifier::{DocumentClassifier, DocumentType};
pub use features::{DocumentFeatures, FeatureExtractor, ImageSource, OcrBlock, OcrEngine};
pub use reference_store::{ReferenceEntry, ReferenceStore};

use crate::error::Result;
use crate::models::ModelProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One submitted document and its authentication outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVerdict {
    pub label: Option<String>,
    pub declared_type: Option<DocumentType>,
    pub classified_type: DocumentType,
    pub ocr_confidence: f32,
    pub result: AuthenticationResult,
}

impl DocumentVerdict {
    /// Stage contribution on 0-100
    pub fn score(&self) -> f64 {
        (self.result.confidence as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// A document upload with its declared type label
#[derive(Debug, Clone)]
pub struct DocumentSubmission {
    pub label: Option<String>,
    pub declared_type: Option<DocumentType>,
    pub source: ImageSource,
}

impl DocumentSubmission {
    /// Parse the declared label; unknown labels are configuration errors.
    pub fn new(declared: Option<&str>, source: ImageSource) -> Result<Self> {
        let declared_type = declared.map(str::parse::<DocumentType>).transpose()?;
        Ok(Self {
            label: None,
            declared_type,
            source,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

pub struct DocumentEngine {
    extractor: FeatureExtractor,
    authenticator: DocumentAuthenticator,
}

impl DocumentEngine {
    pub fn new(models: Arc<ModelProvider>, store: Arc<ReferenceStore>) -> Self {
        Self {
            extractor: FeatureExtractor::new(models),
            authenticator: DocumentAuthenticator::new(store),
        }
    }

    pub fn store(&self) -> &Arc<ReferenceStore> {
        self.authenticator.store()
    }

    pub fn features(&self, submission: DocumentSubmission) -> DocumentFeatures {
        self.extractor
            .extract(submission.source, submission.declared_type, submission.label.as_deref())
    }

    pub fn verify(&self, submission: DocumentSubmission) -> DocumentVerdict {
        let label = submission.label.clone();
        let declared_type = submission.declared_type;
        let features = self.features(submission);
        let result = self.authenticator.authenticate(&features);
        DocumentVerdict {
            label,
            declared_type,
            classified_type: features.classified_type,
            ocr_confidence: features.ocr_confidence,
            result,
        }
    }

    /// Extract features and store them as a known-authentic reference
    pub fn register(&self, reference_id: &str, submission: DocumentSubmission) -> Result<ReferenceEntry> {
        let features = self.features(submission);
        self.store().add(reference_id, features)
    }
}
