//! Sentiment polarity of CV and job texts

use crate::error::Result;
use crate::processing::text_processor::TextProcessor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Characters of input handed to a sentiment model
pub const SENTIMENT_WINDOW: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f32,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.5,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.label == SentimentLabel::Negative
    }
}

pub trait SentimentModel: Send + Sync {
    fn name(&self) -> &str;
    fn analyze(&self, text: &str) -> Result<Sentiment>;
}

/// Word-list polarity used when no sentiment model is installed
pub struct LexiconSentiment {
    processor: TextProcessor,
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

const POSITIVE: &[&str] = &[
    "achieved", "improved", "successful", "successfully", "excellent", "led", "delivered",
    "passionate", "motivated", "innovative", "award", "awarded", "efficient", "growth",
    "increased", "strong", "expert", "reliable", "enthusiastic", "proud", "great", "good",
    "happy", "optimized", "launched", "won",
];

const NEGATIVE: &[&str] = &[
    "failed", "failure", "poor", "bad", "terrible", "fired", "unable", "problem", "problems",
    "difficult", "conflict", "weak", "lack", "lacking", "unfortunately", "hate", "boring",
    "worst", "negative", "angry", "struggled", "quit",
];

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconSentiment {
    pub fn new() -> Self {
        Self {
            processor: TextProcessor::new(),
            positive: POSITIVE.iter().copied().collect(),
            negative: NEGATIVE.iter().copied().collect(),
        }
    }
}

impl SentimentModel for LexiconSentiment {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn analyze(&self, text: &str) -> Result<Sentiment> {
        let window: String = text.chars().take(SENTIMENT_WINDOW).collect();
        let tokens = self.processor.tokenize(&window);

        let positive = tokens.iter().filter(|t| self.positive.contains(t.as_str())).count() as f32;
        let negative = tokens.iter().filter(|t| self.negative.contains(t.as_str())).count() as f32;
        let total = positive + negative;

        if total == 0.0 || positive == negative {
            return Ok(Sentiment::neutral());
        }

        let (label, dominant) = if positive > negative {
            (SentimentLabel::Positive, positive)
        } else {
            (SentimentLabel::Negative, negative)
        };

        Ok(Sentiment {
            label,
            score: dominant / total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_text() {
        let sentiment = LexiconSentiment::new()
            .analyze("Successfully delivered and launched an award winning product")
            .unwrap();
        assert_eq!(sentiment.label, SentimentLabel::Positive);
        assert!((sentiment.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_text() {
        let sentiment = LexiconSentiment::new()
            .analyze("I failed and was fired after a terrible conflict, but delivered once")
            .unwrap();
        assert!(sentiment.is_negative());
        assert!((sentiment.score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_neutral_without_signal() {
        let sentiment = LexiconSentiment::new().analyze("Rust, Python and SQL").unwrap();
        assert_eq!(sentiment, Sentiment::neutral());
    }
}
