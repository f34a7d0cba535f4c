//! Stage gate: scores a stage, records the score, then applies its threshold

use crate::documents::{DocumentEngine, DocumentSubmission, DocumentVerdict};
use crate::emotion::fusion::{fuse_session, FramePrediction};
use crate::emotion::summary::EmotionSummary;
use crate::error::{Alert, AlertKind, AtsGateError, Result};
use crate::interview::{generate_questions, InterviewTranscript, WrittenInterviewScorer};
use crate::pipeline::state::{CandidateRecord, CandidateStatus, StageState};
use crate::pipeline::store::RecordStore;
use crate::processing::scoring::{round2, ScoreBreakdown, ScoringEngine};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const CV_THRESHOLD: f64 = 70.0;
pub const WRITTEN_THRESHOLD: f64 = 60.0;
/// Applied to the mean of the written and video scores
pub const INTERVIEW_THRESHOLD: f64 = 65.0;
pub const FINAL_THRESHOLD: f64 = 70.0;

pub const CV_WEIGHT: f64 = 0.3;
pub const WRITTEN_WEIGHT: f64 = 0.25;
pub const VIDEO_WEIGHT: f64 = 0.25;
pub const DOCUMENTS_WEIGHT: f64 = 0.2;

/// `0.3·cv + 0.25·written + 0.25·video + 0.2·documents`, rounded to cents
pub fn final_score(cv: f64, written: f64, video: f64, documents: f64) -> f64 {
    round2(CV_WEIGHT * cv + WRITTEN_WEIGHT * written + VIDEO_WEIGHT * video + DOCUMENTS_WEIGHT * documents)
        .clamp(0.0, 100.0)
}

/// Evidence for the video stage
#[derive(Debug, Clone)]
pub enum VideoEvidence {
    /// Raw per-frame classifier outputs, fused and smoothed by the scorer
    Predictions(Vec<FramePrediction>),
    /// Summary of a session already processed live
    Summary(EmotionSummary),
}

pub enum StageInput {
    CvMatch { cv_text: String, job_text: String },
    WrittenInterview { answers: Vec<String> },
    VideoInterview(VideoEvidence),
    Documents(Vec<DocumentSubmission>),
    Finalize,
}

impl StageInput {
    /// State a record must be in to accept this input
    pub fn expected_state(&self) -> StageState {
        match self {
            StageInput::CvMatch { .. } => StageState::Submitted,
            StageInput::WrittenInterview { .. } => StageState::CvMatched,
            StageInput::VideoInterview(_) => StageState::WrittenPassed,
            StageInput::Documents(_) => StageState::VideoPassed,
            StageInput::Finalize => StageState::DocumentsVerified,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StageInput::CvMatch { .. } => "cv match",
            StageInput::WrittenInterview { .. } => "written interview",
            StageInput::VideoInterview(_) => "video interview",
            StageInput::Documents(_) => "documents",
            StageInput::Finalize => "final decision",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageDetail {
    CvMatch {
        breakdown: Option<Box<ScoreBreakdown>>,
        questions: Vec<String>,
    },
    Written(InterviewTranscript),
    Video(EmotionSummary),
    Documents(Vec<DocumentVerdict>),
    Final,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageScore {
    pub score: f64,
    pub detail: StageDetail,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub state: StageState,
    pub score: f64,
    pub detail: StageDetail,
    pub alerts: Vec<Alert>,
}

impl StageOutcome {
    pub fn rejected(&self) -> bool {
        self.state == StageState::Rejected
    }
}

/// Produces the score of each stage. The gate only compares these scores
/// against thresholds.
pub trait StageScorer: Send + Sync {
    fn score_cv(&self, cv_text: &str, job_text: &str) -> Result<StageScore>;
    fn score_written(&self, questions: &[String], answers: &[String]) -> Result<StageScore>;
    fn score_video(&self, evidence: VideoEvidence) -> Result<StageScore>;
    fn score_documents(&self, submissions: Vec<DocumentSubmission>) -> Result<StageScore>;
}

/// Default scorer backed by the scoring engine, interview scorer and
/// document engine
pub struct ModelStageScorer {
    engine: ScoringEngine,
    written: WrittenInterviewScorer,
    documents: DocumentEngine,
}

impl ModelStageScorer {
    pub fn new(engine: ScoringEngine, documents: DocumentEngine) -> Self {
        let written = WrittenInterviewScorer::new(Arc::clone(engine.models()));
        Self {
            engine,
            written,
            documents,
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn documents(&self) -> &DocumentEngine {
        &self.documents
    }
}

impl StageScorer for ModelStageScorer {
    fn score_cv(&self, cv_text: &str, job_text: &str) -> Result<StageScore> {
        let cv = self.engine.profile(cv_text);
        let job = self.engine.profile(job_text);
        let breakdown = self.engine.score(&cv, &job)?;
        let questions = generate_questions(&breakdown, &job);
        Ok(StageScore {
            score: breakdown.ats_score,
            alerts: breakdown.alerts.clone(),
            detail: StageDetail::CvMatch {
                breakdown: Some(Box::new(breakdown)),
                questions,
            },
        })
    }

    fn score_written(&self, questions: &[String], answers: &[String]) -> Result<StageScore> {
        let transcript = self.written.evaluate(questions, answers)?;
        let mut alerts = transcript.alerts.clone();
        if answers.len() < questions.len() {
            alerts.push(Alert::new(
                AlertKind::InputTooSparse,
                format!("{} of {} questions unanswered", questions.len() - answers.len(), questions.len()),
            ));
        }
        Ok(StageScore {
            score: round2(transcript.written_score()),
            detail: StageDetail::Written(transcript),
            alerts,
        })
    }

    fn score_video(&self, evidence: VideoEvidence) -> Result<StageScore> {
        let summary = match evidence {
            VideoEvidence::Predictions(predictions) => EmotionSummary::from_samples(&fuse_session(&predictions)),
            VideoEvidence::Summary(summary) => summary,
        };
        Ok(video_stage_score(summary))
    }

    fn score_documents(&self, submissions: Vec<DocumentSubmission>) -> Result<StageScore> {
        let verdicts: Vec<DocumentVerdict> = submissions.into_iter().map(|s| self.documents.verify(s)).collect();
        Ok(documents_stage_score(verdicts))
    }
}

pub fn video_stage_score(summary: EmotionSummary) -> StageScore {
    let mut alerts = Vec::new();
    if summary.is_empty() {
        alerts.push(Alert::new(AlertKind::InputTooSparse, "no video frames were analyzed"));
    }
    StageScore {
        score: summary.video_score(),
        detail: StageDetail::Video(summary),
        alerts,
    }
}

/// Mean of per-document scores; no documents scores 0
pub fn documents_stage_score(verdicts: Vec<DocumentVerdict>) -> StageScore {
    let mut alerts: Vec<Alert> = verdicts.iter().flat_map(|v| v.result.alerts.iter().cloned()).collect();
    let score = if verdicts.is_empty() {
        alerts.push(Alert::new(AlertKind::InputTooSparse, "no documents were submitted"));
        0.0
    } else {
        round2(verdicts.iter().map(DocumentVerdict::score).sum::<f64>() / verdicts.len() as f64)
    };
    StageScore {
        score,
        detail: StageDetail::Documents(verdicts),
        alerts,
    }
}

pub struct StageGate {
    scorer: Arc<dyn StageScorer>,
}

impl StageGate {
    pub fn new(scorer: Arc<dyn StageScorer>) -> Self {
        Self { scorer }
    }

    /// Compute the stage score for `input` without touching the record.
    pub fn score(&self, record: &CandidateRecord, input: StageInput) -> Result<StageScore> {
        if record.stage.is_terminal() {
            return Err(AtsGateError::InvalidTransition(format!(
                "candidate {} is already {}",
                record.candidate_id, record.stage
            )));
        }
        let expected = input.expected_state();
        if record.stage != expected {
            return Err(AtsGateError::InvalidTransition(format!(
                "{} input requires state {}, candidate {} is {}",
                input.name(),
                expected,
                record.candidate_id,
                record.stage
            )));
        }

        match input {
            StageInput::CvMatch { cv_text, job_text } => self.scorer.score_cv(&cv_text, &job_text),
            StageInput::WrittenInterview { answers } => self.scorer.score_written(&record.questions, &answers),
            StageInput::VideoInterview(evidence) => self.scorer.score_video(evidence),
            StageInput::Documents(submissions) => self.scorer.score_documents(submissions),
            StageInput::Finalize => {
                let [cv, written, video, documents] = record.component_scores()?;
                Ok(StageScore {
                    score: final_score(cv, written, video, documents),
                    detail: StageDetail::Final,
                    alerts: Vec::new(),
                })
            }
        }
    }

    /// Write the stage score and its artifacts onto the record.
    pub fn record_score(record: &mut CandidateRecord, stage_score: &StageScore) {
        let score = stage_score.score.clamp(0.0, 100.0);
        match &stage_score.detail {
            StageDetail::CvMatch { breakdown, questions } => {
                record.cv_match_score = Some(score);
                record.cv_breakdown = breakdown.as_deref().cloned();
                record.questions = questions.clone();
            }
            StageDetail::Written(transcript) => {
                record.written_interview_score = Some(score);
                record.interview.questions = transcript.questions.clone();
            }
            StageDetail::Video(summary) => {
                record.video_interview_score = Some(score);
                record.interview.emotion_summary = Some(summary.clone());
            }
            StageDetail::Documents(verdicts) => {
                record.documents_score = Some(score);
                record.documents = verdicts.clone();
            }
            StageDetail::Final => {
                record.final_score = Some(score);
            }
        }
        for alert in &stage_score.alerts {
            if !record.alerts.contains(alert) {
                record.alerts.push(alert.clone());
            }
        }
        record.touch();
    }

    /// Compare the recorded score against the stage threshold and move the
    /// record to its next state.
    pub fn decide(record: &mut CandidateRecord, stage_score: StageScore) -> StageOutcome {
        let from = record.stage;
        let passed = match &stage_score.detail {
            StageDetail::CvMatch { .. } => stage_score.score >= CV_THRESHOLD,
            StageDetail::Written(_) => stage_score.score >= WRITTEN_THRESHOLD,
            StageDetail::Video(_) => {
                let written = record.written_interview_score.unwrap_or(0.0);
                (written + stage_score.score) / 2.0 >= INTERVIEW_THRESHOLD
            }
            StageDetail::Documents(_) => true,
            StageDetail::Final => stage_score.score >= FINAL_THRESHOLD,
        };

        match (passed, from.next()) {
            (true, Some(next)) => {
                record.stage = next;
                if next == StageState::Advanced {
                    record.status = CandidateStatus::Advanced;
                }
                record.touch();
                info!("Candidate {} passed {} -> {} ({:.2})", record.candidate_id, from, next, stage_score.score);
            }
            _ => {
                record.reject(from);
                warn!(
                    "Candidate {} rejected from {} with score {:.2}",
                    record.candidate_id, from, stage_score.score
                );
            }
        }

        StageOutcome {
            state: record.stage,
            score: stage_score.score,
            detail: stage_score.detail,
            alerts: stage_score.alerts,
        }
    }

    /// Score, record and decide in one step, without persistence.
    pub fn advance(&self, record: &mut CandidateRecord, input: StageInput) -> Result<StageOutcome> {
        let stage_score = self.score(record, input)?;
        Self::record_score(record, &stage_score);
        Ok(Self::decide(record, stage_score))
    }
}

/// Inputs for a complete evaluation run
pub struct Application {
    pub cv_text: String,
    pub job_text: String,
    pub answers: Vec<String>,
    pub video: VideoEvidence,
    pub documents: Vec<DocumentSubmission>,
}

/// Gate plus record store; each stage persists its score before the
/// threshold decision and again after it.
pub struct Pipeline {
    gate: StageGate,
    store: Arc<dyn RecordStore>,
}

impl Pipeline {
    pub fn new(gate: StageGate, store: Arc<dyn RecordStore>) -> Self {
        Self { gate, store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn submit(&self, candidate_id: &str, job_id: &str) -> Result<CandidateRecord> {
        let record = CandidateRecord::new(candidate_id, job_id);
        self.store.create(record.clone())?;
        info!("Candidate {} submitted for job {}", candidate_id, job_id);
        Ok(record)
    }

    pub fn advance(&self, candidate_id: &str, input: StageInput) -> Result<StageOutcome> {
        let mut record = self.store.get(candidate_id)?;
        let stage_score = self.gate.score(&record, input)?;
        StageGate::record_score(&mut record, &stage_score);
        self.store.update(&record)?;

        let outcome = StageGate::decide(&mut record, stage_score);
        self.store.update(&record)?;
        Ok(outcome)
    }

    /// Run every stage in order, stopping at the first rejection.
    pub fn evaluate(&self, candidate_id: &str, application: Application) -> Result<(CandidateRecord, Vec<StageOutcome>)> {
        let Application {
            cv_text,
            job_text,
            answers,
            video,
            documents,
        } = application;

        let inputs = vec![
            StageInput::CvMatch { cv_text, job_text },
            StageInput::WrittenInterview { answers },
            StageInput::VideoInterview(video),
            StageInput::Documents(documents),
            StageInput::Finalize,
        ];

        let mut outcomes = Vec::new();
        for input in inputs {
            let outcome = self.advance(candidate_id, input)?;
            let stop = outcome.rejected();
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
        Ok((self.store.get(candidate_id)?, outcomes))
    }
}
