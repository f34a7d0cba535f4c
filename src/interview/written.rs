//! Written interview answer scoring

use crate::emotion::summary::EmotionSummary;
use crate::error::{Alert, AlertKind, Result};
use crate::models::ModelProvider;
use crate::processing::embeddings::{cosine_similarity, SEMANTIC};
use crate::processing::text_processor::TextProcessor;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Answers shorter than this many words get `SHORT_ANSWER_SCORE`
pub const MIN_ANSWER_WORDS: usize = 10;
pub const SHORT_ANSWER_SCORE: f64 = 0.3;
/// Score given to an answer the embedding model could not rate
pub const NEUTRAL_ANSWER_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
    /// Relevance in [0, 1]
    pub score: f64,
}

/// Structured interview record kept on the candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterviewTranscript {
    pub questions: Vec<QuestionAnswer>,
    #[serde(default)]
    pub emotion_summary: Option<EmotionSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<Alert>,
}

impl InterviewTranscript {
    /// Mean answer score on 0-100; an empty interview scores 0
    pub fn written_score(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        let mean = self.questions.iter().map(|qa| qa.score).sum::<f64>() / self.questions.len() as f64;
        (mean * 100.0).clamp(0.0, 100.0)
    }
}

pub struct WrittenInterviewScorer {
    models: Arc<ModelProvider>,
}

impl WrittenInterviewScorer {
    pub fn new(models: Arc<ModelProvider>) -> Self {
        Self { models }
    }

    /// Relevance of one answer: `(cosine + 1) / 2` between question and
    /// answer embeddings.
    pub fn score_answer(&self, question: &str, answer: &str) -> Result<f64> {
        if TextProcessor::word_count(answer) < MIN_ANSWER_WORDS {
            return Ok(SHORT_ANSWER_SCORE);
        }
        let q = self.models.embeddings.embed(question, SEMANTIC)?;
        let a = self.models.embeddings.embed(answer, SEMANTIC)?;
        let cosine = cosine_similarity(&q, &a)? as f64;
        Ok(((cosine + 1.0) / 2.0).clamp(0.0, 1.0))
    }

    /// Pair answers with questions in order; missing answers count as empty.
    /// An answer the model cannot rate scores neutral and leaves an alert.
    pub fn evaluate(&self, questions: &[String], answers: &[String]) -> Result<InterviewTranscript> {
        let mut transcript = InterviewTranscript::default();
        for (i, question) in questions.iter().enumerate() {
            let answer = answers.get(i).cloned().unwrap_or_default();
            let score = match self.score_answer(question, &answer) {
                Ok(score) => score,
                Err(e) => {
                    warn!("Could not score answer {}: {}", i + 1, e);
                    transcript.alerts.push(Alert::new(
                        AlertKind::ExtractionDegraded,
                        format!("answer {} scored neutral, embedding failed: {}", i + 1, e),
                    ));
                    NEUTRAL_ANSWER_SCORE
                }
            };
            debug!("Question {} scored {:.3}", i + 1, score);
            transcript.questions.push(QuestionAnswer {
                question: question.clone(),
                answer,
                score,
            });
        }
        if answers.len() > questions.len() {
            debug!("Ignoring {} extra answers", answers.len() - questions.len());
        }
        info!("Written interview score {:.2}", transcript.written_score());
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AtsGateError;
    use crate::processing::embeddings::{BackendKind, EmbeddingBackend};

    struct UnreachableBackend;

    impl EmbeddingBackend for UnreachableBackend {
        fn name(&self) -> &str {
            "unreachable"
        }
        fn kind(&self) -> BackendKind {
            BackendKind::Semantic
        }
        fn dimension(&self) -> usize {
            8
        }
        fn max_tokens(&self) -> usize {
            64
        }
        fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AtsGateError::Embedding("device lost".to_string()))
        }
    }

    fn scorer() -> WrittenInterviewScorer {
        WrittenInterviewScorer::new(Arc::new(ModelProvider::lightweight()))
    }

    fn failing_scorer() -> WrittenInterviewScorer {
        let models = ModelProvider::builder()
            .semantic_backend(Arc::new(UnreachableBackend))
            .build()
            .unwrap();
        WrittenInterviewScorer::new(Arc::new(models))
    }

    #[test]
    fn test_embedding_failure_scores_neutral_with_alert() {
        let questions = vec!["Why this job?".to_string(), "Tell us about a project.".to_string()];
        let answers = vec![
            "Short one".to_string(),
            "I rebuilt our billing service in Rust and cut the monthly cloud bill by a third".to_string(),
        ];
        let transcript = failing_scorer().evaluate(&questions, &answers).unwrap();

        assert_eq!(transcript.questions[0].score, SHORT_ANSWER_SCORE);
        assert_eq!(transcript.questions[1].score, NEUTRAL_ANSWER_SCORE);
        assert_eq!(transcript.alerts.len(), 1);
        assert_eq!(transcript.alerts[0].kind, AlertKind::ExtractionDegraded);
        assert!((transcript.written_score() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_answer_penalized() {
        let score = scorer().score_answer("Why this job?", "Because I like it").unwrap();
        assert_eq!(score, SHORT_ANSWER_SCORE);
    }

    #[test]
    fn test_relevant_answer_scores_higher_than_neutral() {
        let scorer = scorer();
        let question = "Can you describe your experience with Kubernetes?";
        let relevant = "I operated Kubernetes clusters for three years and wrote Kubernetes operators describing experience";
        let score = scorer.score_answer(question, relevant).unwrap();
        assert!(score > 0.5);
        assert!(score <= 1.0);
    }

    #[test]
    fn test_missing_answers_count_as_empty() {
        let questions = vec!["First question?".to_string(), "Second question?".to_string()];
        let transcript = scorer().evaluate(&questions, &[]).unwrap();

        assert_eq!(transcript.questions.len(), 2);
        assert!(transcript.questions.iter().all(|qa| qa.answer.is_empty()));
        assert!((transcript.written_score() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_written_score_is_mean() {
        let transcript = InterviewTranscript {
            questions: vec![
                QuestionAnswer { question: "a".into(), answer: String::new(), score: 0.3 },
                QuestionAnswer { question: "b".into(), answer: String::new(), score: 0.9 },
            ],
            emotion_summary: None,
            alerts: Vec::new(),
        };
        assert!((transcript.written_score() - 60.0).abs() < 1e-9);
        assert_eq!(InterviewTranscript::default().written_score(), 0.0);
    }
}
