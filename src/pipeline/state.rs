//! Candidate records and the stage state machine

use crate::documents::DocumentVerdict;
use crate::error::{Alert, AtsGateError, Result};
use crate::interview::InterviewTranscript;
use crate::processing::scoring::ScoreBreakdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Submitted,
    CvMatched,
    WrittenPassed,
    VideoPassed,
    DocumentsVerified,
    Advanced,
    Rejected,
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Advanced | StageState::Rejected)
    }

    /// State reached when the stage starting here passes
    pub fn next(&self) -> Option<StageState> {
        match self {
            StageState::Submitted => Some(StageState::CvMatched),
            StageState::CvMatched => Some(StageState::WrittenPassed),
            StageState::WrittenPassed => Some(StageState::VideoPassed),
            StageState::VideoPassed => Some(StageState::DocumentsVerified),
            StageState::DocumentsVerified => Some(StageState::Advanced),
            StageState::Advanced | StageState::Rejected => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Submitted => "submitted",
            StageState::CvMatched => "cv_matched",
            StageState::WrittenPassed => "written_passed",
            StageState::VideoPassed => "video_passed",
            StageState::DocumentsVerified => "documents_verified",
            StageState::Advanced => "advanced",
            StageState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Advanced,
    Rejected,
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Advanced => "advanced",
            CandidateStatus::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub candidate_id: String,
    pub job_id: String,
    pub cv_match_score: Option<f64>,
    pub written_interview_score: Option<f64>,
    pub video_interview_score: Option<f64>,
    pub documents_score: Option<f64>,
    pub final_score: Option<f64>,
    pub status: CandidateStatus,
    pub stage: StageState,
    /// Last state reached before a rejection
    #[serde(default)]
    pub rejected_from: Option<StageState>,
    #[serde(default)]
    pub cv_breakdown: Option<ScoreBreakdown>,
    /// Questions generated at CV matching for the written interview
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub interview: InterviewTranscript,
    #[serde(default)]
    pub documents: Vec<DocumentVerdict>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateRecord {
    pub fn new(candidate_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            candidate_id: candidate_id.into(),
            job_id: job_id.into(),
            cv_match_score: None,
            written_interview_score: None,
            video_interview_score: None,
            documents_score: None,
            final_score: None,
            status: CandidateStatus::Pending,
            stage: StageState::Submitted,
            rejected_from: None,
            cv_breakdown: None,
            questions: Vec::new(),
            interview: InterviewTranscript::default(),
            documents: Vec::new(),
            alerts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// All four component scores, once every stage has run
    pub fn component_scores(&self) -> Result<[f64; 4]> {
        match (
            self.cv_match_score,
            self.written_interview_score,
            self.video_interview_score,
            self.documents_score,
        ) {
            (Some(cv), Some(written), Some(video), Some(documents)) => Ok([cv, written, video, documents]),
            _ => Err(AtsGateError::InvalidTransition(format!(
                "candidate {} is missing component scores",
                self.candidate_id
            ))),
        }
    }

    pub fn reject(&mut self, from: StageState) {
        self.stage = StageState::Rejected;
        self.status = CandidateStatus::Rejected;
        self.rejected_from = Some(from);
        self.touch();
    }
}
