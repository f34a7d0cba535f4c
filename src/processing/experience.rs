//! Seniority estimation from years of experience and level keywords

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Junior,
    MidLevel,
    Senior,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceProfile {
    pub years_detected: Vec<u32>,
    pub level_indicators: Vec<String>,
    pub estimated_level: ExperienceLevel,
    pub confidence: f32,
}

struct Patterns {
    years: Regex,
    junior: Regex,
    senior: Regex,
    manager: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        years: Regex::new(
            r"(?i)(\d+)\+?\s*(?:ans?|années?|years?)\s*(?:d['e]|of)?\s*(?:expérience|experience)",
        )
        .expect("static regex"),
        junior: Regex::new(r"(?i)\b(?:junior|débutant|entry.level|stagiaire|apprenti)\b").expect("static regex"),
        senior: Regex::new(r"(?i)\b(?:senior|expert|lead|principal|architect|chef)\b").expect("static regex"),
        manager: Regex::new(r"(?i)\b(?:manager|directeur|responsable|supervisor|team.lead)\b")
            .expect("static regex"),
    })
}

impl ExperienceProfile {
    /// Years bucket the level first (<=2 junior, <=5 mid, else senior);
    /// keyword indicators then override in junior, senior, manager order.
    pub fn analyze(text: &str) -> Self {
        let patterns = patterns();
        let mut profile = ExperienceProfile {
            years_detected: Vec::new(),
            level_indicators: Vec::new(),
            estimated_level: ExperienceLevel::MidLevel,
            confidence: 0.5,
        };

        profile.years_detected = patterns
            .years
            .captures_iter(text)
            .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<u32>().ok()))
            .collect();

        if let Some(max_years) = profile.years_detected.iter().max().copied() {
            profile.estimated_level = match max_years {
                0..=2 => ExperienceLevel::Junior,
                3..=5 => ExperienceLevel::MidLevel,
                _ => ExperienceLevel::Senior,
            };
            profile.confidence = 0.8;
        }

        let indicator_sets = [
            (&patterns.junior, ExperienceLevel::Junior),
            (&patterns.senior, ExperienceLevel::Senior),
            (&patterns.manager, ExperienceLevel::Senior),
        ];
        for (regex, level) in indicator_sets {
            let found: Vec<String> = regex.find_iter(text).map(|m| m.as_str().to_lowercase()).collect();
            if !found.is_empty() {
                profile.level_indicators.extend(found);
                profile.estimated_level = level;
                profile.confidence = profile.confidence.max(0.7);
            }
        }

        profile
    }

    pub fn mentions(&self, indicator: &str) -> bool {
        self.level_indicators.iter().any(|i| i == indicator)
    }
}
