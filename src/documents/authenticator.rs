//! Nearest-reference authentication of submitted documents

use crate::documents::classifier::DocumentType;
use crate::documents::features::DocumentFeatures;
use crate::documents::reference_store::ReferenceStore;
use crate::error::{Alert, AlertKind};
use crate::processing::embeddings::cosine_similarity;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

pub const AUTHENTICITY_THRESHOLD: f32 = 0.85;
pub const MIN_OCR_CONFIDENCE: f32 = 0.7;
pub const MIN_TEXT_CHARS: usize = 50;

const TEXT_WEIGHT: f32 = 0.4;
const LAYOUT_WEIGHT: f32 = 0.4;
const VISUAL_WEIGHT: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSimilarity {
    pub text: f32,
    pub layout: f32,
    pub visual: f32,
    pub global: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    pub document_type: DocumentType,
    pub is_authentic: bool,
    pub confidence: f32,
    pub best_match_id: Option<String>,
    pub similarities: BTreeMap<String, ReferenceSimilarity>,
    pub alerts: Vec<Alert>,
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn bounded_cosine(a: &[f32], b: &[f32]) -> f32 {
    match cosine_similarity(a, b) {
        Ok(similarity) => similarity.clamp(0.0, 1.0),
        Err(e) => {
            debug!("Incomparable feature vectors: {}", e);
            0.0
        }
    }
}

/// Weighted text, layout and visual similarity, each clamped to [0, 1]
pub fn compare(candidate: &DocumentFeatures, reference: &DocumentFeatures) -> ReferenceSimilarity {
    let words_a = word_set(&candidate.text_content);
    let words_b = word_set(&reference.text_content);
    let union = words_a.union(&words_b).count();
    let text = if union == 0 {
        0.0
    } else {
        words_a.intersection(&words_b).count() as f32 / union as f32
    };

    let layout = bounded_cosine(&candidate.layout_embedding, &reference.layout_embedding);
    let visual = bounded_cosine(&candidate.visual_features, &reference.visual_features);

    ReferenceSimilarity {
        text,
        layout,
        visual,
        global: (TEXT_WEIGHT * text + LAYOUT_WEIGHT * layout + VISUAL_WEIGHT * visual).clamp(0.0, 1.0),
    }
}

pub struct DocumentAuthenticator {
    store: Arc<ReferenceStore>,
    threshold: f32,
}

impl DocumentAuthenticator {
    pub fn new(store: Arc<ReferenceStore>) -> Self {
        Self {
            store,
            threshold: AUTHENTICITY_THRESHOLD,
        }
    }

    pub fn store(&self) -> &Arc<ReferenceStore> {
        &self.store
    }

    pub fn authenticate(&self, features: &DocumentFeatures) -> AuthenticationResult {
        let doc_type = features.document_type;
        let mut alerts = features.alerts.clone();
        let references = self.store.references(doc_type);

        let mut similarities = BTreeMap::new();
        let mut best: Option<(String, f32)> = None;
        for (reference_id, entry) in &references {
            let similarity = compare(features, &entry.features);
            let best_score = best.as_ref().map(|(_, score)| *score).unwrap_or(0.0);
            if similarity.global > best_score {
                best = Some((reference_id.clone(), similarity.global));
            }
            similarities.insert(reference_id.clone(), similarity);
        }

        let confidence = best.as_ref().map(|(_, score)| *score).unwrap_or(0.0);
        let is_authentic = best.is_some() && confidence >= self.threshold;

        if references.is_empty() {
            alerts.push(Alert::new(
                AlertKind::ReferenceMissing,
                format!("no reference documents registered for type {}", doc_type),
            ));
        } else if !is_authentic {
            alerts.push(Alert::new(
                AlertKind::LowSimilarity,
                format!("best similarity {:.3} is below {}", confidence, self.threshold),
            ));
        }
        if features.ocr_confidence < MIN_OCR_CONFIDENCE {
            alerts.push(Alert::new(
                AlertKind::LowOcrConfidence,
                format!("OCR confidence {:.3}", features.ocr_confidence),
            ));
        }
        if features.text_content.chars().count() < MIN_TEXT_CHARS {
            alerts.push(Alert::new(AlertKind::InsufficientText, "not enough readable text"));
        }
        if features.type_mismatch() {
            if let Some(declared) = features.declared_type {
                alerts.push(Alert::new(
                    AlertKind::TypeMismatch,
                    format!("declared {} but the document reads as {}", declared, features.classified_type),
                ));
            }
        }

        info!(
            "Authenticated {} document against {} references: authentic={} confidence={:.3}",
            doc_type,
            references.len(),
            is_authentic,
            confidence
        );

        AuthenticationResult {
            document_type: doc_type,
            is_authentic,
            confidence,
            best_match_id: best.map(|(id, _)| id),
            similarities,
            alerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::features::{DocumentMetadata, VISUAL_FEATURES_LEN};
    use crate::error::has_alert;
    use chrono::Utc;

    const CARD_TEXT: &str = "Royaume du Maroc Carte Nationale d'Identite numero AB123456 nee le 01 janvier 1990";

    fn features(text: &str, layout: Vec<f32>, visual_fill: f32) -> DocumentFeatures {
        DocumentFeatures {
            text_content: text.to_string(),
            layout_embedding: layout,
            visual_features: vec![visual_fill; VISUAL_FEATURES_LEN],
            ocr_confidence: 0.9,
            document_type: DocumentType::Cin,
            classified_type: DocumentType::Cin,
            declared_type: Some(DocumentType::Cin),
            metadata: DocumentMetadata {
                source: None,
                processed_at: Utc::now(),
                text_length: text.len(),
                layout_elements: 3,
                width: 100,
                height: 60,
            },
            alerts: Vec::new(),
        }
    }

    #[test]
    fn test_self_authentication() {
        let store = Arc::new(ReferenceStore::in_memory());
        let document = features(CARD_TEXT, vec![0.3, 0.4, 0.5], 0.2);
        store.add("card-1", document.clone()).unwrap();

        let result = DocumentAuthenticator::new(store).authenticate(&document);
        assert!(result.is_authentic);
        assert!(result.confidence >= AUTHENTICITY_THRESHOLD);
        assert_eq!(result.best_match_id.as_deref(), Some("card-1"));
        assert!(result.alerts.is_empty());
    }

    #[test]
    fn test_empty_store_reports_missing_reference() {
        let store = Arc::new(ReferenceStore::in_memory());
        let mut document = features("", vec![0.0; 3], 0.0);
        document.document_type = DocumentType::Unknown;
        document.ocr_confidence = 0.0;

        let result = DocumentAuthenticator::new(store).authenticate(&document);
        assert!(!result.is_authentic);
        assert_eq!(result.confidence, 0.0);
        assert!(result.best_match_id.is_none());
        assert!(has_alert(&result.alerts, AlertKind::ReferenceMissing));
        assert!(has_alert(&result.alerts, AlertKind::LowOcrConfidence));
        assert!(has_alert(&result.alerts, AlertKind::InsufficientText));
    }

    #[test]
    fn test_dissimilar_document_rejected() {
        let store = Arc::new(ReferenceStore::in_memory());
        store.add("card-1", features(CARD_TEXT, vec![1.0, 0.0, 0.0], 0.2)).unwrap();

        let forged = features("Carte de fidelite supermarche points bonus", vec![0.0, 1.0, 0.0], 0.2);
        let result = DocumentAuthenticator::new(store).authenticate(&forged);

        assert!(!result.is_authentic);
        let similarity = result.similarities["card-1"];
        assert_eq!(similarity.layout, 0.0);
        assert!((similarity.visual - 1.0).abs() < 1e-5);
        assert!(similarity.global < AUTHENTICITY_THRESHOLD);
        assert!(has_alert(&result.alerts, AlertKind::LowSimilarity));
        assert!(has_alert(&result.alerts, AlertKind::InsufficientText));
    }

    #[test]
    fn test_zero_similarity_has_no_best_match() {
        let store = Arc::new(ReferenceStore::in_memory());
        store.add("card-1", features(CARD_TEXT, vec![1.0, 0.0, 0.0], 0.2)).unwrap();

        let blank = features("", vec![0.0; 3], 0.0);
        let result = DocumentAuthenticator::new(store).authenticate(&blank);

        assert_eq!(result.similarities["card-1"].global, 0.0);
        assert!(result.best_match_id.is_none());
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_authentic);
        assert!(has_alert(&result.alerts, AlertKind::LowSimilarity));
    }

    #[test]
    fn test_best_match_selected() {
        let store = Arc::new(ReferenceStore::in_memory());
        store.add("far", features("permis de conduire", vec![0.0, 1.0, 0.0], 0.2)).unwrap();
        store.add("near", features(CARD_TEXT, vec![0.3, 0.4, 0.5], 0.2)).unwrap();

        let result = DocumentAuthenticator::new(store).authenticate(&features(CARD_TEXT, vec![0.3, 0.4, 0.5], 0.2));
        assert_eq!(result.best_match_id.as_deref(), Some("near"));
        assert_eq!(result.similarities.len(), 2);
    }

    #[test]
    fn test_type_mismatch_warning() {
        let store = Arc::new(ReferenceStore::in_memory());
        let mut document = features(CARD_TEXT, vec![0.3, 0.4, 0.5], 0.2);
        document.declared_type = Some(DocumentType::Permis);
        store.add("card-1", document.clone()).unwrap();

        let result = DocumentAuthenticator::new(store).authenticate(&document);
        assert!(result.is_authentic);
        assert!(has_alert(&result.alerts, AlertKind::TypeMismatch));
    }
}
