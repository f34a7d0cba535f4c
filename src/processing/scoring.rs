//! Weighted multi-signal ATS scoring

use crate::error::{Alert, AtsGateError, Result};
use crate::models::ModelProvider;
use crate::processing::entities::EntityCategory;
use crate::processing::experience::ExperienceLevel;
use crate::processing::profile::TextProfile;
use crate::processing::similarity::{
    overlap_ratio, overlap_signal, SimilarityFuser, SimilarityReport, ENTITY_SIMILARITY,
    TFIDF_SIMILARITY, TOKEN_JACCARD,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

pub const SKILL_AVERAGE: &str = "skill_average";
pub const WEIGHT_TOLERANCE: f64 = 1e-6;
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Validated signal weights: non-negative, summing to 1 within tolerance.
/// Deserializing goes through the same validation as `new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ScoringWeights {
    weights: BTreeMap<String, f64>,
}

impl TryFrom<BTreeMap<String, f64>> for ScoringWeights {
    type Error = AtsGateError;

    fn try_from(weights: BTreeMap<String, f64>) -> Result<Self> {
        Self::new(weights)
    }
}

impl From<ScoringWeights> for BTreeMap<String, f64> {
    fn from(weights: ScoringWeights) -> Self {
        weights.weights
    }
}

fn is_known_signal(name: &str) -> bool {
    if matches!(name, SKILL_AVERAGE | TFIDF_SIMILARITY | ENTITY_SIMILARITY | TOKEN_JACCARD) {
        return true;
    }
    if EntityCategory::SKILL_CATEGORIES
        .iter()
        .any(|c| overlap_signal(*c) == name)
    {
        return true;
    }
    name.strip_suffix("_similarity").map(|slot| !slot.is_empty()).unwrap_or(false)
}

impl ScoringWeights {
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(AtsGateError::Configuration("Scoring weights are empty".to_string()));
        }
        for (name, weight) in &weights {
            if !is_known_signal(name) {
                return Err(AtsGateError::Configuration(format!("Unknown scoring signal: {}", name)));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(AtsGateError::Configuration(format!(
                    "Weight for {} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AtsGateError::Configuration(format!(
                "Scoring weights must sum to 1.0, got {:.6}",
                sum
            )));
        }
        Ok(Self { weights })
    }

    fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self {
            weights: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    /// Semantic cosine, TF-IDF cosine and average skill match
    pub fn standard() -> Self {
        Self::from_pairs(&[
            ("semantic_similarity", 0.6),
            (TFIDF_SIMILARITY, 0.2),
            (SKILL_AVERAGE, 0.2),
        ])
    }

    /// Standard signals plus mean entity overlap
    pub fn enhanced() -> Self {
        Self::from_pairs(&[
            ("semantic_similarity", 0.5),
            (TFIDF_SIMILARITY, 0.15),
            (ENTITY_SIMILARITY, 0.2),
            (SKILL_AVERAGE, 0.15),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvQuality {
    pub completeness: f32,
    pub technical_depth: f32,
    pub experience_clarity: f32,
}

impl CvQuality {
    const SECTIONS: [EntityCategory; 4] = [
        EntityCategory::Person,
        EntityCategory::Skill,
        EntityCategory::Organization,
        EntityCategory::Education,
    ];

    /// Vocabulary technologies count as a skills section even without a
    /// model-tagged skill.
    fn has_section(cv: &TextProfile, category: EntityCategory) -> bool {
        match category {
            EntityCategory::Skill => {
                cv.entities.has(category) || EntityCategory::TECHNICAL.iter().any(|c| cv.entities.has(*c))
            }
            other => cv.entities.has(other),
        }
    }

    pub fn assess(cv: &TextProfile) -> Self {
        let present = Self::SECTIONS.iter().filter(|c| Self::has_section(cv, **c)).count();
        let technical: usize = EntityCategory::TECHNICAL.iter().map(|c| cv.entities.count(*c)).sum();
        Self {
            completeness: present as f32 / Self::SECTIONS.len() as f32,
            technical_depth: (technical as f32 / 10.0).min(1.0),
            experience_clarity: cv.experience.confidence,
        }
    }

    pub fn missing_sections(cv: &TextProfile) -> Vec<&'static str> {
        Self::SECTIONS
            .iter()
            .filter(|c| !Self::has_section(cv, **c))
            .map(|c| c.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub ats_score: f64,
    pub similarity_scores: SimilarityReport,
    pub skill_matches: BTreeMap<EntityCategory, f32>,
    pub skill_average: f32,
    pub missing_skills: BTreeMap<EntityCategory, Vec<String>>,
    pub quality: CvQuality,
    pub recommendations: Vec<String>,
    pub alerts: Vec<Alert>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct ScoringEngine {
    models: Arc<ModelProvider>,
    weights: ScoringWeights,
    fuser: SimilarityFuser,
    language: String,
    min_text_length: usize,
}

impl ScoringEngine {
    /// Fails when a weighted embedding signal has no registered backend.
    pub fn new(models: Arc<ModelProvider>, weights: ScoringWeights) -> Result<Self> {
        for (name, _) in weights.iter() {
            let is_fixed = name == TFIDF_SIMILARITY || name == ENTITY_SIMILARITY;
            if let Some(slot) = name.strip_suffix("_similarity") {
                if !is_fixed && models.embeddings.backend(slot).is_err() {
                    return Err(AtsGateError::Configuration(format!(
                        "Weight {} refers to unregistered embedding backend {}",
                        name, slot
                    )));
                }
            }
        }

        Ok(Self {
            models,
            weights,
            fuser: SimilarityFuser::new(),
            language: "en".to_string(),
            min_text_length: 500,
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_min_text_length(mut self, min_text_length: usize) -> Self {
        self.min_text_length = min_text_length;
        self
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn models(&self) -> &Arc<ModelProvider> {
        &self.models
    }

    pub fn profile(&self, text: &str) -> TextProfile {
        TextProfile::build(text, &self.language, &self.models)
    }

    pub fn score_texts(&self, cv_text: &str, job_text: &str) -> Result<ScoreBreakdown> {
        let cv = self.profile(cv_text);
        let job = self.profile(job_text);
        self.score(&cv, &job)
    }

    pub fn score(&self, cv: &TextProfile, job: &TextProfile) -> Result<ScoreBreakdown> {
        let similarity_scores = self.fuser.fuse(cv, job)?;

        let mut skill_matches = BTreeMap::new();
        let mut missing_skills = BTreeMap::new();
        let mut required = 0usize;
        let mut ratio_sum = 0.0f32;
        for category in EntityCategory::SKILL_CATEGORIES {
            let ratio = overlap_ratio(cv.entities.get(category), job.entities.get(category));
            skill_matches.insert(category, ratio);
            if let Some(job_set) = job.entities.get(category).filter(|s| !s.is_empty()) {
                required += 1;
                ratio_sum += ratio;
                let missing = match cv.entities.get(category) {
                    Some(cv_set) => job_set.missing_from(cv_set),
                    None => job_set.iter().map(str::to_string).collect(),
                };
                missing_skills.insert(category, missing);
            }
        }
        let skill_average = if required == 0 { 0.0 } else { ratio_sum / required as f32 };

        let mut weighted = 0.0f64;
        for (signal, weight) in self.weights.iter() {
            let value = if signal == SKILL_AVERAGE {
                skill_average
            } else {
                similarity_scores.get(signal).unwrap_or(0.0)
            };
            debug!("signal {} = {:.4} (weight {:.2})", signal, value, weight);
            weighted += weight * value as f64;
        }
        let ats_score = round2(100.0 * weighted).clamp(0.0, 100.0);

        let quality = CvQuality::assess(cv);
        let recommendations = self.recommendations(cv, job, &skill_matches, &missing_skills, &quality);

        let mut alerts = cv.alerts.clone();
        for alert in &job.alerts {
            if !alerts.contains(alert) {
                alerts.push(alert.clone());
            }
        }

        info!("ATS score {:.2} (skill average {:.2})", ats_score, skill_average);

        Ok(ScoreBreakdown {
            ats_score,
            similarity_scores,
            skill_matches,
            skill_average,
            missing_skills,
            quality,
            recommendations,
            alerts,
        })
    }

    /// Skill gaps first, then generic notes; at most five. A skill already
    /// named in one gap line is not repeated in another.
    fn recommendations(
        &self,
        cv: &TextProfile,
        job: &TextProfile,
        skill_matches: &BTreeMap<EntityCategory, f32>,
        missing_skills: &BTreeMap<EntityCategory, Vec<String>>,
        quality: &CvQuality,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();
        let mut reported: HashSet<String> = HashSet::new();

        let gap_order = EntityCategory::TECHNICAL.into_iter().chain([EntityCategory::Skill]);
        for category in gap_order {
            let ratio = skill_matches.get(&category).copied().unwrap_or(0.0);
            if ratio >= 0.5 {
                continue;
            }
            let Some(missing) = missing_skills.get(&category) else {
                continue;
            };
            let names: Vec<&str> = missing
                .iter()
                .filter(|name| !reported.contains(&name.to_lowercase()))
                .take(3)
                .map(String::as_str)
                .collect();
            if names.is_empty() {
                continue;
            }
            reported.extend(names.iter().map(|name| name.to_lowercase()));
            recommendations.push(format!("Add {} skills: {}", category.label(), names.join(", ")));
        }

        if cv.char_count < self.min_text_length {
            recommendations
                .push("Expand your CV with more detail about your experience and achievements".to_string());
        }

        if cv.sentiment.is_negative() {
            recommendations.push("Use more positive, achievement-oriented language".to_string());
        }

        if quality.completeness < 0.7 {
            recommendations.push(format!(
                "Complete the missing CV sections: {}",
                CvQuality::missing_sections(cv).join(", ")
            ));
        }
        if quality.technical_depth < 0.5 {
            recommendations.push("Detail your technical skills and the tools you have used".to_string());
        }

        if cv.experience.estimated_level == ExperienceLevel::Junior && job.experience.mentions("senior") {
            recommendations
                .push("Highlight leadership and concrete achievements to match the senior level required".to_string());
        }

        recommendations.truncate(MAX_RECOMMENDATIONS);
        recommendations
    }
}
