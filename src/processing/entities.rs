//! Entity and skill extraction
//!
//! Entities come from two sources merged per category: an optional
//! statistical [`EntityModel`] and a deterministic vocabulary matcher backed
//! by Aho-Corasick plus a handful of regex rules. Values are deduplicated
//! case-insensitively; the first spelling seen is kept for display.

use crate::error::{Alert, AlertKind, AtsGateError, Result};
use aho_corasick::{AhoCorasick, MatchKind};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Person,
    Organization,
    Location,
    Date,
    Money,
    Skill,
    SoftSkill,
    Certification,
    Education,
    Language,
    ProgrammingLanguages,
    Frameworks,
    Databases,
    Cloud,
    Tools,
    AiMl,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 16] = [
        EntityCategory::Person,
        EntityCategory::Organization,
        EntityCategory::Location,
        EntityCategory::Date,
        EntityCategory::Money,
        EntityCategory::Skill,
        EntityCategory::SoftSkill,
        EntityCategory::Certification,
        EntityCategory::Education,
        EntityCategory::Language,
        EntityCategory::ProgrammingLanguages,
        EntityCategory::Frameworks,
        EntityCategory::Databases,
        EntityCategory::Cloud,
        EntityCategory::Tools,
        EntityCategory::AiMl,
    ];

    /// Categories that carry job requirements and feed skill-match ratios
    pub const SKILL_CATEGORIES: [EntityCategory; 7] = [
        EntityCategory::Skill,
        EntityCategory::ProgrammingLanguages,
        EntityCategory::Frameworks,
        EntityCategory::Databases,
        EntityCategory::Cloud,
        EntityCategory::Tools,
        EntityCategory::AiMl,
    ];

    /// Technology categories counted towards technical depth
    pub const TECHNICAL: [EntityCategory; 6] = [
        EntityCategory::ProgrammingLanguages,
        EntityCategory::Frameworks,
        EntityCategory::Databases,
        EntityCategory::Cloud,
        EntityCategory::Tools,
        EntityCategory::AiMl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Person => "person",
            EntityCategory::Organization => "organization",
            EntityCategory::Location => "location",
            EntityCategory::Date => "date",
            EntityCategory::Money => "money",
            EntityCategory::Skill => "skill",
            EntityCategory::SoftSkill => "soft_skill",
            EntityCategory::Certification => "certification",
            EntityCategory::Education => "education",
            EntityCategory::Language => "language",
            EntityCategory::ProgrammingLanguages => "programming_languages",
            EntityCategory::Frameworks => "frameworks",
            EntityCategory::Databases => "databases",
            EntityCategory::Cloud => "cloud",
            EntityCategory::Tools => "tools",
            EntityCategory::AiMl => "ai_ml",
        }
    }

    /// Human-readable name used in recommendations
    pub fn label(&self) -> String {
        match self {
            EntityCategory::Skill => "technical".to_string(),
            EntityCategory::ProgrammingLanguages => "programming".to_string(),
            EntityCategory::AiMl => "AI/ML".to_string(),
            other => other.as_str().replace('_', " "),
        }
    }

    /// Map a model label (spaCy-style uppercase or our own names) to a category.
    pub fn from_model_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "PERSON" | "PER" => Some(EntityCategory::Person),
            "ORG" | "ORGANIZATION" => Some(EntityCategory::Organization),
            "GPE" | "LOC" | "LOCATION" => Some(EntityCategory::Location),
            "DATE" => Some(EntityCategory::Date),
            "MONEY" => Some(EntityCategory::Money),
            "SKILL" => Some(EntityCategory::Skill),
            "CERTIFICATION" => Some(EntityCategory::Certification),
            "EDUCATION" => Some(EntityCategory::Education),
            "LANGUAGE" => Some(EntityCategory::Language),
            _ => None,
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityCategory {
    type Err = AtsGateError;

    fn from_str(s: &str) -> Result<Self> {
        EntityCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AtsGateError::Configuration(format!("Unknown entity category: {}", s)))
    }
}

/// Case-insensitive set of entity strings, ordered by normalized key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct EntitySet {
    items: BTreeMap<String, String>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        let key = value.to_lowercase();
        if self.items.contains_key(&key) {
            return false;
        }
        self.items.insert(key, value.to_string());
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.items.contains_key(&value.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Display values in normalized-key order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.values().map(String::as_str)
    }

    pub fn intersection_count(&self, other: &EntitySet) -> usize {
        self.items.keys().filter(|k| other.items.contains_key(*k)).count()
    }

    /// Values of `self` absent from `other`, sorted by normalized key
    pub fn missing_from(&self, other: &EntitySet) -> Vec<String> {
        self.items
            .iter()
            .filter(|(k, _)| !other.items.contains_key(*k))
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn jaccard(&self, other: &EntitySet) -> f32 {
        let intersection = self.intersection_count(other);
        let union = self.len() + other.len() - intersection;
        if union == 0 {
            0.0
        } else {
            intersection as f32 / union as f32
        }
    }

    pub fn extend_from(&mut self, other: &EntitySet) {
        for value in other.iter() {
            self.insert(value);
        }
    }
}

impl From<Vec<String>> for EntitySet {
    fn from(values: Vec<String>) -> Self {
        let mut set = EntitySet::new();
        for value in &values {
            set.insert(value);
        }
        set
    }
}

impl From<EntitySet> for Vec<String> {
    fn from(set: EntitySet) -> Self {
        set.items.into_values().collect()
    }
}

/// Entities grouped by category. Empty categories are not stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entities {
    map: BTreeMap<EntityCategory, EntitySet>,
}

impl Entities {
    pub fn insert(&mut self, category: EntityCategory, value: &str) {
        if value.trim().is_empty() {
            return;
        }
        self.map.entry(category).or_default().insert(value);
    }

    pub fn get(&self, category: EntityCategory) -> Option<&EntitySet> {
        self.map.get(&category)
    }

    pub fn has(&self, category: EntityCategory) -> bool {
        self.get(category).map(|s| !s.is_empty()).unwrap_or(false)
    }

    pub fn count(&self, category: EntityCategory) -> usize {
        self.get(category).map(EntitySet::len).unwrap_or(0)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&EntityCategory, &EntitySet)> {
        self.map.iter()
    }

    /// Per-category union
    pub fn merge(&mut self, other: &Entities) {
        for (category, set) in &other.map {
            self.map.entry(*category).or_default().extend_from(set);
        }
    }
}

/// An entity span reported by a statistical model
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedEntity {
    pub label: String,
    pub text: String,
}

/// Statistical named-entity recognizer collaborator
pub trait EntityModel: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(&self, text: &str, language: &str) -> Result<Vec<RecognizedEntity>>;
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub entities: Entities,
    pub alerts: Vec<Alert>,
}

struct VocabularyEntry {
    term: &'static str,
    categories: Vec<EntityCategory>,
}

pub struct EntityExtractor {
    matcher: AhoCorasick,
    vocabulary: Vec<VocabularyEntry>,
    rules: Vec<(EntityCategory, Regex)>,
    model: Option<Arc<dyn EntityModel>>,
}

const PROGRAMMING: &[&str] = &[
    "Python", "Java", "JavaScript", "TypeScript", "C++", "C#", "PHP", "Ruby", "Go", "Rust",
    "Swift", "Kotlin", "Scala", "R", "MATLAB", "SQL",
];
const FRAMEWORKS: &[&str] = &[
    "React", "Angular", "Vue", "Django", "Flask", "Spring", "Laravel", "Rails", "Express",
    "FastAPI", "Node.js", "Next.js",
];
const DATABASES: &[&str] = &[
    "MySQL", "PostgreSQL", "MongoDB", "Redis", "Elasticsearch", "Oracle", "SQLite",
    "Cassandra", "DynamoDB", "Neo4j",
];
const CLOUD: &[&str] = &[
    "AWS", "Azure", "GCP", "Google Cloud", "Heroku", "DigitalOcean", "Kubernetes", "Docker",
    "Terraform", "Jenkins",
];
const TOOLS: &[&str] = &[
    "Git", "GitHub", "GitLab", "Jira", "Confluence", "Slack", "Trello", "Jenkins", "CircleCI",
    "Travis", "Webpack", "Babel",
];
const AI_ML: &[&str] = &[
    "TensorFlow", "PyTorch", "scikit-learn", "Keras", "OpenCV", "NLTK", "spaCy", "Pandas",
    "NumPy", "Matplotlib",
];
const SOFT_SKILLS: &[&str] = &[
    "leadership", "communication", "teamwork", "problem solving", "analytical", "creative",
    "innovative", "adaptable",
];
const CERTIFICATIONS: &[&str] = &[
    "PMP", "CISSP", "CCNA", "ITIL", "Scrum Master", "TOEFL", "IELTS", "CPA",
];
const EDUCATION: &[&str] = &[
    "Bachelor", "Master", "PhD", "MBA", "Licence", "Doctorat", "Baccalauréat", "Diploma",
    "Engineering degree", "Computer Science",
];
const LANGUAGES: &[&str] = &[
    "English", "French", "Arabic", "Spanish", "German", "Italian", "Chinese", "Portuguese",
];

impl EntityExtractor {
    pub fn new(model: Option<Arc<dyn EntityModel>>) -> Result<Self> {
        let vocabulary = Self::build_vocabulary();
        let patterns: Vec<&str> = vocabulary.iter().map(|e| e.term).collect();
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns)
            .map_err(|e| AtsGateError::Configuration(format!("Failed to build skill matcher: {}", e)))?;

        let rule = |category, pattern: &str| -> Result<(EntityCategory, Regex)> {
            Regex::new(pattern)
                .map(|re| (category, re))
                .map_err(|e| AtsGateError::Configuration(format!("Invalid extraction rule: {}", e)))
        };
        let rules = vec![
            rule(
                EntityCategory::Date,
                r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(?:19|20)\d{2}\b",
            )?,
            rule(EntityCategory::Date, r"\b(?:19|20)\d{2}\b")?,
            rule(
                EntityCategory::Money,
                r"(?i)[$€£]\s?\d[\d,]*(?:\.\d+)?(?:\s?[km])?\b|\b\d[\d,]*(?:\.\d+)?\s?(?:usd|eur|mad|dollars|euros)\b",
            )?,
            rule(
                EntityCategory::Person,
                r"(?m)^[ \t]*(?i:name|nom)[ \t]*:[ \t]*(\p{Lu}[\p{L}'-]+(?:[ \t]+\p{Lu}[\p{L}'-]+)+)",
            )?,
            rule(
                EntityCategory::Organization,
                r"\b(\p{Lu}[\w&]*(?: \p{Lu}[\w&]*)* (?:Inc|Ltd|LLC|Corp|GmbH|SA|SARL|Labs|Technologies|Solutions))\b",
            )?,
        ];

        Ok(Self {
            matcher,
            vocabulary,
            rules,
            model,
        })
    }

    fn build_vocabulary() -> Vec<VocabularyEntry> {
        let groups: [(EntityCategory, &[&'static str]); 10] = [
            (EntityCategory::ProgrammingLanguages, PROGRAMMING),
            (EntityCategory::Frameworks, FRAMEWORKS),
            (EntityCategory::Databases, DATABASES),
            (EntityCategory::Cloud, CLOUD),
            (EntityCategory::Tools, TOOLS),
            (EntityCategory::AiMl, AI_ML),
            (EntityCategory::SoftSkill, SOFT_SKILLS),
            (EntityCategory::Certification, CERTIFICATIONS),
            (EntityCategory::Education, EDUCATION),
            (EntityCategory::Language, LANGUAGES),
        ];

        let mut vocabulary: Vec<VocabularyEntry> = Vec::new();
        for (category, terms) in groups {
            for term in terms {
                match vocabulary.iter_mut().find(|e| e.term.eq_ignore_ascii_case(term)) {
                    Some(entry) => entry.categories.push(category),
                    None => vocabulary.push(VocabularyEntry {
                        term,
                        categories: vec![category],
                    }),
                }
            }
        }
        vocabulary
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Extract entities from `text`. Never fails: model problems degrade to
    /// pattern matching with an alert.
    pub fn extract(&self, text: &str, language: &str) -> Extraction {
        let mut entities = self.extract_patterns(text);
        let mut alerts = Vec::new();

        match &self.model {
            Some(model) => match model.recognize(text, language) {
                Ok(found) => {
                    debug!("{} recognized {} entities", model.name(), found.len());
                    for entity in found {
                        if let Some(category) = EntityCategory::from_model_label(&entity.label) {
                            entities.insert(category, &entity.text);
                        }
                    }
                }
                Err(e) => {
                    warn!("Entity model {} failed, using patterns only: {}", model.name(), e);
                    alerts.push(Alert::new(
                        AlertKind::ExtractionDegraded,
                        format!("entity model unavailable ({}); pattern matching only", e),
                    ));
                }
            },
            None => alerts.push(Alert::new(
                AlertKind::ExtractionDegraded,
                "no entity model installed; pattern matching only",
            )),
        }

        Extraction { entities, alerts }
    }

    /// Deterministic vocabulary and rule matching
    pub fn extract_patterns(&self, text: &str) -> Entities {
        let mut entities = Entities::default();

        for mat in self.matcher.find_iter(text) {
            if !is_word_boundary(text, mat.start(), mat.end()) {
                continue;
            }
            let entry = &self.vocabulary[mat.pattern().as_usize()];
            for category in &entry.categories {
                entities.insert(*category, entry.term);
            }
        }

        for (category, regex) in &self.rules {
            for caps in regex.captures_iter(text) {
                let value = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str());
                if let Some(value) = value {
                    entities.insert(*category, value);
                }
            }
        }

        entities
    }
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    !before.map(is_word).unwrap_or(false) && !after.map(is_word).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingModel;

    impl EntityModel for FailingModel {
        fn name(&self) -> &str {
            "failing"
        }
        fn recognize(&self, _text: &str, _language: &str) -> Result<Vec<RecognizedEntity>> {
            Err(AtsGateError::ModelLoading("weights missing".to_string()))
        }
    }

    struct FixedModel;

    impl EntityModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }
        fn recognize(&self, _text: &str, _language: &str) -> Result<Vec<RecognizedEntity>> {
            Ok(vec![
                RecognizedEntity { label: "PERSON".to_string(), text: "Jane Roe".to_string() },
                RecognizedEntity { label: "ORG".to_string(), text: "Acme".to_string() },
                RecognizedEntity { label: "CARDINAL".to_string(), text: "3".to_string() },
            ])
        }
    }

    #[test]
    fn test_vocabulary_matching() {
        let extractor = EntityExtractor::new(None).unwrap();
        let entities = extractor.extract_patterns("Built services in python and PostgreSQL on AWS with Docker.");

        let programming = entities.get(EntityCategory::ProgrammingLanguages).unwrap();
        assert!(programming.contains("Python"));
        assert!(entities.get(EntityCategory::Databases).unwrap().contains("postgresql"));
        assert_eq!(entities.count(EntityCategory::Cloud), 2);
        assert!(!entities.has(EntityCategory::Skill));
    }

    #[test]
    fn test_longest_match_and_word_boundaries() {
        let extractor = EntityExtractor::new(None).unwrap();
        let entities = extractor.extract_patterns("JavaScript and Gopher enthusiasts");

        let programming = entities.get(EntityCategory::ProgrammingLanguages).unwrap();
        assert!(programming.contains("JavaScript"));
        assert!(!programming.contains("Java"));
        assert!(!programming.contains("Go"));
    }

    #[test]
    fn test_shared_term_lands_in_both_categories() {
        let extractor = EntityExtractor::new(None).unwrap();
        let entities = extractor.extract_patterns("CI with Jenkins");
        assert!(entities.get(EntityCategory::Cloud).unwrap().contains("jenkins"));
        assert!(entities.get(EntityCategory::Tools).unwrap().contains("jenkins"));
    }

    #[test]
    fn test_rules_dates_money_person() {
        let extractor = EntityExtractor::new(None).unwrap();
        let text = "Name: Jane Roe\nJoined in March 2019, salary $85,000";
        let entities = extractor.extract_patterns(text);

        assert!(entities.get(EntityCategory::Date).unwrap().contains("March 2019"));
        assert!(entities.get(EntityCategory::Money).unwrap().contains("$85,000"));
        assert!(entities.get(EntityCategory::Person).unwrap().contains("Jane Roe"));
    }

    #[test]
    fn test_missing_model_degrades_with_alert() {
        let extractor = EntityExtractor::new(Some(Arc::new(FailingModel))).unwrap();
        let extraction = extractor.extract("Rust and Kubernetes", "en");

        assert_eq!(extraction.alerts.len(), 1);
        assert_eq!(extraction.alerts[0].kind, AlertKind::ExtractionDegraded);
        assert!(extraction.entities.has(EntityCategory::ProgrammingLanguages));
    }

    #[test]
    fn test_model_entities_merged_and_filtered() {
        let extractor = EntityExtractor::new(Some(Arc::new(FixedModel))).unwrap();
        let extraction = extractor.extract("Rust developer", "en");

        assert!(extraction.alerts.is_empty());
        assert!(extraction.entities.get(EntityCategory::Person).unwrap().contains("jane roe"));
        assert!(extraction.entities.has(EntityCategory::Organization));
        assert!(extraction.entities.has(EntityCategory::ProgrammingLanguages));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = EntityExtractor::new(None).unwrap();
        let text = "Senior engineer, React, Redis, leadership, PhD, English and French";
        let first = extractor.extract(text, "en");
        let second = extractor.extract(text, "en");
        assert_eq!(first.entities, second.entities);
    }

    #[test]
    fn test_entity_set_semantics() {
        let job: EntitySet = vec!["Rust".to_string(), "Go".to_string(), "SQL".to_string()].into();
        let cv: EntitySet = vec!["rust".to_string(), "sql".to_string(), "Python".to_string()].into();

        assert_eq!(job.intersection_count(&cv), 2);
        assert_eq!(job.missing_from(&cv), vec!["Go".to_string()]);
        assert!((job.jaccard(&cv) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_category_round_trip_names() {
        for category in EntityCategory::ALL {
            assert_eq!(category.as_str().parse::<EntityCategory>().unwrap(), category);
        }
        assert!("astrology".parse::<EntityCategory>().is_err());
    }
}
