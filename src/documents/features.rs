//! Multi-modal feature extraction from document images

use crate::documents::classifier::{DocumentClassifier, DocumentType};
use crate::error::{Alert, AlertKind, AtsGateError, Result};
use crate::models::ModelProvider;
use crate::processing::embeddings::SEMANTIC;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const VISUAL_FEATURES_LEN: usize = 100;
pub const HISTOGRAM_BINS: usize = 64;
/// OCR blocks at or below this confidence are discarded
pub const OCR_BLOCK_MIN_CONFIDENCE: f32 = 0.5;
const EDGE_THRESHOLD: f32 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrBlock {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrBlock>>;
}

/// Raw upload: image bytes or a base64 string, optionally a `data:` URL
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Base64(String),
}

impl ImageSource {
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            ImageSource::Bytes(bytes) => Ok(bytes),
            ImageSource::Base64(encoded) => decode_base64(&encoded),
        }
    }
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| AtsGateError::InvalidInput(format!("Invalid base64 image: {}", e)))
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| AtsGateError::UnsupportedFormat(format!("Cannot decode image: {}", e)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: Option<String>,
    pub processed_at: DateTime<Utc>,
    pub text_length: usize,
    pub layout_elements: usize,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFeatures {
    pub text_content: String,
    pub layout_embedding: Vec<f32>,
    pub visual_features: Vec<f32>,
    pub ocr_confidence: f32,
    /// Type used for reference lookup
    pub document_type: DocumentType,
    pub classified_type: DocumentType,
    pub declared_type: Option<DocumentType>,
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl DocumentFeatures {
    pub fn type_mismatch(&self) -> bool {
        match self.declared_type {
            Some(declared) => self.classified_type.is_known() && declared != self.classified_type,
            None => false,
        }
    }
}

/// Resolve the lookup type: a recognized classification wins, otherwise the
/// declared label is used.
pub fn effective_type(classified: DocumentType, declared: Option<DocumentType>) -> DocumentType {
    if classified.is_known() {
        classified
    } else {
        declared.unwrap_or(DocumentType::Unknown)
    }
}

/// 64-bin normalized grayscale histogram, edge statistics and dimensions,
/// zero padded to a fixed length.
pub fn visual_features(gray: &GrayImage) -> Vec<f32> {
    let mut features = Vec::with_capacity(VISUAL_FEATURES_LEN);
    let (width, height) = gray.dimensions();
    let pixel_count = (width as usize * height as usize).max(1) as f32;

    let mut histogram = [0u32; HISTOGRAM_BINS];
    for pixel in gray.pixels() {
        histogram[(pixel.0[0] as usize * HISTOGRAM_BINS) / 256] += 1;
    }
    features.extend(histogram.iter().map(|count| *count as f32 / pixel_count));

    features.extend(edge_statistics(gray));

    features.push(height as f32 / 1000.0);
    features.push(width as f32 / 1000.0);
    features.push(if width > 0 { height as f32 / width as f32 } else { 0.0 });

    features.resize(VISUAL_FEATURES_LEN, 0.0);
    features
}

/// [edge density, mean gradient, gradient std, horizontal share, vertical share]
fn edge_statistics(gray: &GrayImage) -> [f32; 5] {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return [0.0; 5];
    }

    let at = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as f32;
    let mut magnitudes = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
    let mut edges = 0usize;
    let mut horizontal = 0usize;
    let mut vertical = 0usize;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let dx = (at(x + 1, y) - at(x - 1, y)).abs();
            let dy = (at(x, y + 1) - at(x, y - 1)).abs();
            let magnitude = dx + dy;
            if magnitude > EDGE_THRESHOLD {
                edges += 1;
                if dy > dx {
                    horizontal += 1;
                } else {
                    vertical += 1;
                }
            }
            magnitudes.push(magnitude / 510.0);
        }
    }

    let n = magnitudes.len() as f32;
    let mean = magnitudes.iter().sum::<f32>() / n;
    let variance = magnitudes.iter().map(|m| (m - mean).powi(2)).sum::<f32>() / n;
    let edge_total = edges.max(1) as f32;

    [
        edges as f32 / n,
        mean,
        variance.sqrt(),
        horizontal as f32 / edge_total,
        vertical as f32 / edge_total,
    ]
}

pub struct FeatureExtractor {
    models: Arc<ModelProvider>,
    classifier: DocumentClassifier,
}

impl FeatureExtractor {
    pub fn new(models: Arc<ModelProvider>) -> Self {
        Self {
            models,
            classifier: DocumentClassifier::new(),
        }
    }

    pub fn classifier(&self) -> &DocumentClassifier {
        &self.classifier
    }

    /// Decode and analyze an upload. Undecodable input yields empty
    /// features with an `InputTooSparse` alert.
    pub fn extract(
        &self,
        source: ImageSource,
        declared: Option<DocumentType>,
        label: Option<&str>,
    ) -> DocumentFeatures {
        let decoded = source.into_bytes().and_then(|bytes| decode_image(&bytes));
        match decoded {
            Ok(image) => self.extract_image(&image, declared, label),
            Err(e) => {
                warn!("Document image unusable: {}", e);
                let mut features = self.empty_features(declared, label);
                features
                    .alerts
                    .push(Alert::new(AlertKind::InputTooSparse, format!("image could not be decoded: {}", e)));
                features
            }
        }
    }

    pub fn extract_image(
        &self,
        image: &DynamicImage,
        declared: Option<DocumentType>,
        label: Option<&str>,
    ) -> DocumentFeatures {
        let mut alerts = Vec::new();
        let blocks = self.recognize(image, &mut alerts);

        let text_content = blocks
            .iter()
            .map(|b| b.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let ocr_confidence = if blocks.is_empty() {
            0.0
        } else {
            blocks.iter().map(|b| b.confidence).sum::<f32>() / blocks.len() as f32
        };

        let layout_embedding = self.layout_embedding(&text_content, &mut alerts);
        let gray = image.to_luma8();
        let classified_type = self.classifier.classify(&text_content);

        info!(
            "Extracted document features: {} OCR blocks, type {}, OCR confidence {:.3}",
            blocks.len(),
            classified_type,
            ocr_confidence
        );

        DocumentFeatures {
            metadata: DocumentMetadata {
                source: label.map(str::to_string),
                processed_at: Utc::now(),
                text_length: text_content.chars().count(),
                layout_elements: blocks.len(),
                width: gray.width(),
                height: gray.height(),
            },
            visual_features: visual_features(&gray),
            text_content,
            layout_embedding,
            ocr_confidence,
            document_type: effective_type(classified_type, declared),
            classified_type,
            declared_type: declared,
            alerts,
        }
    }

    fn recognize(&self, image: &DynamicImage, alerts: &mut Vec<Alert>) -> Vec<OcrBlock> {
        let Some(ocr) = &self.models.ocr else {
            alerts.push(Alert::new(AlertKind::ExtractionDegraded, "no OCR engine installed"));
            return Vec::new();
        };

        match ocr.recognize(image) {
            Ok(blocks) => {
                let total = blocks.len();
                let kept: Vec<OcrBlock> = blocks
                    .into_iter()
                    .filter(|b| b.confidence > OCR_BLOCK_MIN_CONFIDENCE)
                    .collect();
                debug!("OCR {} kept {} of {} blocks", ocr.name(), kept.len(), total);
                kept
            }
            Err(e) => {
                warn!("OCR engine {} failed: {}", ocr.name(), e);
                alerts.push(Alert::new(AlertKind::ExtractionDegraded, format!("OCR failed: {}", e)));
                Vec::new()
            }
        }
    }

    fn layout_embedding(&self, text: &str, alerts: &mut Vec<Alert>) -> Vec<f32> {
        match self.models.embeddings.embed(text, SEMANTIC) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Layout embedding unavailable: {}", e);
                alerts.push(Alert::new(
                    AlertKind::ExtractionDegraded,
                    format!("layout embedding unavailable: {}", e),
                ));
                Vec::new()
            }
        }
    }

    fn empty_features(&self, declared: Option<DocumentType>, label: Option<&str>) -> DocumentFeatures {
        let layout_dimension = self
            .models
            .embeddings
            .backend(SEMANTIC)
            .map(|b| b.dimension())
            .unwrap_or(0);
        DocumentFeatures {
            text_content: String::new(),
            layout_embedding: vec![0.0; layout_dimension],
            visual_features: vec![0.0; VISUAL_FEATURES_LEN],
            ocr_confidence: 0.0,
            document_type: effective_type(DocumentType::Unknown, declared),
            classified_type: DocumentType::Unknown,
            declared_type: declared,
            metadata: DocumentMetadata {
                source: label.map(str::to_string),
                processed_at: Utc::now(),
                text_length: 0,
                layout_elements: 0,
                width: 0,
                height: 0,
            },
            alerts: Vec::new(),
        }
    }
}
