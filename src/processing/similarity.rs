//! Pairwise similarity signals between a candidate profile and a job profile

use crate::error::Result;
use crate::processing::embeddings::cosine_similarity;
use crate::processing::entities::{EntityCategory, EntitySet};
use crate::processing::profile::TextProfile;
use crate::processing::text_processor::TextProcessor;
use crate::processing::tfidf::TfIdfVectorizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TFIDF_SIMILARITY: &str = "tfidf_similarity";
pub const ENTITY_SIMILARITY: &str = "entity_similarity";
pub const TOKEN_JACCARD: &str = "token_jaccard";

/// Named similarity scores, each in [0, 1]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimilarityReport {
    scores: BTreeMap<String, f32>,
}

impl SimilarityReport {
    pub fn insert(&mut self, name: impl Into<String>, score: f32) {
        self.scores.insert(name.into(), score.clamp(0.0, 1.0));
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.scores.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.scores.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

pub fn embedding_signal(slot: &str) -> String {
    format!("{}_similarity", slot)
}

pub fn overlap_signal(category: EntityCategory) -> String {
    format!("{}_overlap", category.as_str())
}

/// `|A ∩ B| / |B|` with the job side as denominator; empty job side is 0.
pub fn overlap_ratio(candidate: Option<&EntitySet>, job: Option<&EntitySet>) -> f32 {
    match (candidate, job) {
        (_, None) => 0.0,
        (_, Some(job)) if job.is_empty() => 0.0,
        (None, Some(_)) => 0.0,
        (Some(candidate), Some(job)) => job.intersection_count(candidate) as f32 / job.len() as f32,
    }
}

pub struct SimilarityFuser {
    processor: TextProcessor,
}

impl Default for SimilarityFuser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityFuser {
    pub fn new() -> Self {
        Self {
            processor: TextProcessor::new(),
        }
    }

    pub fn fuse(&self, candidate: &TextProfile, job: &TextProfile) -> Result<SimilarityReport> {
        let mut report = SimilarityReport::default();

        for (slot, candidate_vec) in &candidate.embeddings {
            if let Some(job_vec) = job.embeddings.get(slot) {
                report.insert(embedding_signal(slot), cosine_similarity(candidate_vec, job_vec)?);
            }
        }

        report.insert(
            TFIDF_SIMILARITY,
            TfIdfVectorizer::pair_similarity(&candidate.raw_text, &job.raw_text)?,
        );

        let mut populated = 0usize;
        let mut ratio_sum = 0.0f32;
        for category in EntityCategory::SKILL_CATEGORIES {
            let ratio = overlap_ratio(candidate.entities.get(category), job.entities.get(category));
            if job.entities.has(category) {
                populated += 1;
                ratio_sum += ratio;
            }
            report.insert(overlap_signal(category), ratio);
        }
        let entity_similarity = if populated == 0 { 0.0 } else { ratio_sum / populated as f32 };
        report.insert(ENTITY_SIMILARITY, entity_similarity);

        report.insert(
            TOKEN_JACCARD,
            self.processor.text_similarity(&candidate.raw_text, &job.raw_text),
        );

        Ok(report)
    }
}
