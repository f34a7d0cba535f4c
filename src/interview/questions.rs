//! Interview question generation

use crate::processing::entities::EntityCategory;
use crate::processing::profile::TextProfile;
use crate::processing::scoring::ScoreBreakdown;
use std::collections::HashSet;

pub const MAX_QUESTIONS: usize = 4;
pub const MAX_SKILL_QUESTIONS: usize = 2;

pub const GENERAL_QUESTIONS: [&str; 4] = [
    "Describe a difficult situation you faced in a previous role and how you resolved it.",
    "What are your main professional strengths and weaknesses?",
    "Why are you interested in this position?",
    "Where do you see yourself in five years?",
];

/// Prompts shown during the recorded video interview
pub const VIDEO_QUESTIONS: [&str; 4] = [
    "Introduce yourself in a few words.",
    "Why are you interested in this position?",
    "What is your greatest professional achievement?",
    "How do you handle stress at work?",
];

pub fn skill_question(skill: &str) -> String {
    format!("Can you describe your experience with {}?", skill)
}

/// Up to two skill questions followed by the general bank, capped at four.
///
/// Skills the CV is missing come first; remaining slots are filled from the
/// job's required skills.
pub fn generate_questions(breakdown: &ScoreBreakdown, job: &TextProfile) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut skills: Vec<String> = Vec::new();

    let missing = EntityCategory::SKILL_CATEGORIES
        .iter()
        .filter_map(|c| breakdown.missing_skills.get(c))
        .flatten()
        .cloned();
    let required = EntityCategory::SKILL_CATEGORIES
        .iter()
        .filter_map(|c| job.entities.get(*c))
        .flat_map(|set| set.iter().map(str::to_string).collect::<Vec<_>>());

    for skill in missing.chain(required) {
        if skills.len() == MAX_SKILL_QUESTIONS {
            break;
        }
        if seen.insert(skill.to_lowercase()) {
            skills.push(skill);
        }
    }

    skills
        .iter()
        .map(|s| skill_question(s))
        .chain(GENERAL_QUESTIONS.iter().map(|q| q.to_string()))
        .take(MAX_QUESTIONS)
        .collect()
}
