//! Immutable per-text analysis shared by every scoring signal

use crate::error::{Alert, AlertKind};
use crate::models::ModelProvider;
use crate::processing::entities::Entities;
use crate::processing::experience::ExperienceProfile;
use crate::processing::sentiment::Sentiment;
use crate::processing::text_processor::TextProcessor;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextProfile {
    pub raw_text: String,
    pub language: String,
    pub entities: Entities,
    pub embeddings: BTreeMap<String, Vec<f32>>,
    pub sentiment: Sentiment,
    pub experience: ExperienceProfile,
    pub word_count: usize,
    pub char_count: usize,
    pub alerts: Vec<Alert>,
}

impl TextProfile {
    /// Analyze `text` once. Model failures are recorded as alerts and
    /// replaced by neutral values; building a profile never fails.
    pub fn build(text: &str, language: &str, models: &ModelProvider) -> Self {
        let processor = TextProcessor::new();
        let normalized = processor.normalize(text);
        let mut alerts = Vec::new();

        let extraction = models.extractor.extract(text, language);
        alerts.extend(extraction.alerts);

        let mut embeddings = BTreeMap::new();
        for slot in models.embeddings.slots() {
            match models.embeddings.embed(&normalized, slot) {
                Ok(vector) => {
                    embeddings.insert(slot.to_string(), vector);
                }
                Err(e) => {
                    warn!("Embedding backend {} failed: {}", slot, e);
                    alerts.push(Alert::new(
                        AlertKind::ExtractionDegraded,
                        format!("embedding backend {} unavailable: {}", slot, e),
                    ));
                }
            }
        }

        let sentiment = match models.sentiment.analyze(&normalized) {
            Ok(sentiment) => sentiment,
            Err(e) => {
                warn!("Sentiment model {} failed: {}", models.sentiment.name(), e);
                alerts.push(Alert::new(
                    AlertKind::ExtractionDegraded,
                    format!("sentiment unavailable: {}", e),
                ));
                Sentiment::neutral()
            }
        };

        let profile = Self {
            language: language.to_string(),
            entities: extraction.entities,
            embeddings,
            sentiment,
            experience: ExperienceProfile::analyze(&normalized),
            word_count: TextProcessor::word_count(&normalized),
            char_count: normalized.chars().count(),
            raw_text: normalized,
            alerts,
        };
        debug!(
            "Profiled {} words, {} embedding backends, {} alerts",
            profile.word_count,
            profile.embeddings.len(),
            profile.alerts.len()
        );
        profile
    }
}
