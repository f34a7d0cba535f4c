//! Report data handed to the output formatters

use crate::documents::DocumentVerdict;
use crate::error::Alert;
use crate::pipeline::{CandidateRecord, StageOutcome};
use crate::processing::scoring::ScoreBreakdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub body: ReportBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub tool_version: String,
    /// Input files or identifiers the report was built from
    pub sources: Vec<String>,
    /// Degradations noticed while loading models
    pub model_alerts: Vec<Alert>,
}

impl ReportMetadata {
    pub fn new(sources: Vec<String>, processing_time_ms: u64) -> Self {
        Self {
            generated_at: Utc::now(),
            processing_time_ms,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            sources,
            model_alerts: Vec::new(),
        }
    }

    pub fn with_model_alerts(mut self, alerts: Vec<Alert>) -> Self {
        self.model_alerts = alerts;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportBody {
    /// Full staged evaluation of one candidate
    Pipeline {
        record: Box<CandidateRecord>,
        outcomes: Vec<StageOutcome>,
    },
    /// Standalone CV versus job scoring
    CvMatch {
        breakdown: Box<ScoreBreakdown>,
        questions: Vec<String>,
    },
    /// Authentication of one or more documents
    Documents { verdicts: Vec<DocumentVerdict> },
}

impl EvaluationReport {
    pub fn pipeline(metadata: ReportMetadata, record: CandidateRecord, outcomes: Vec<StageOutcome>) -> Self {
        Self {
            metadata,
            body: ReportBody::Pipeline {
                record: Box::new(record),
                outcomes,
            },
        }
    }

    pub fn cv_match(metadata: ReportMetadata, breakdown: ScoreBreakdown, questions: Vec<String>) -> Self {
        Self {
            metadata,
            body: ReportBody::CvMatch {
                breakdown: Box::new(breakdown),
                questions,
            },
        }
    }

    pub fn documents(metadata: ReportMetadata, verdicts: Vec<DocumentVerdict>) -> Self {
        Self {
            metadata,
            body: ReportBody::Documents { verdicts },
        }
    }

    /// Headline score on 0-100, if the report has one
    pub fn headline_score(&self) -> Option<f64> {
        match &self.body {
            ReportBody::Pipeline { record, outcomes } => record
                .final_score
                .or_else(|| outcomes.last().map(|o| o.score)),
            ReportBody::CvMatch { breakdown, .. } => Some(breakdown.ats_score),
            ReportBody::Documents { verdicts } if verdicts.is_empty() => None,
            ReportBody::Documents { verdicts } => {
                Some(verdicts.iter().map(DocumentVerdict::score).sum::<f64>() / verdicts.len() as f64)
            }
        }
    }

    pub fn verdict(&self) -> String {
        match &self.body {
            ReportBody::Pipeline { record, .. } => match record.rejected_from {
                Some(stage) => format!("Rejected at {}", stage),
                None => format!("{} ({})", record.status, record.stage),
            },
            ReportBody::CvMatch { breakdown, .. } => score_verdict(breakdown.ats_score).to_string(),
            ReportBody::Documents { verdicts } => {
                let authentic = verdicts.iter().filter(|v| v.result.is_authentic).count();
                format!("{} of {} documents authentic", authentic, verdicts.len())
            }
        }
    }

    /// Every alert in the report, model degradations first, without repeats
    pub fn all_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.metadata.model_alerts.clone();
        let body_alerts: Vec<&Alert> = match &self.body {
            ReportBody::Pipeline { record, .. } => record.alerts.iter().collect(),
            ReportBody::CvMatch { breakdown, .. } => breakdown.alerts.iter().collect(),
            ReportBody::Documents { verdicts } => verdicts.iter().flat_map(|v| v.result.alerts.iter()).collect(),
        };
        for alert in body_alerts {
            if !alerts.contains(alert) {
                alerts.push(alert.clone());
            }
        }
        alerts
    }
}

pub fn score_verdict(score: f64) -> &'static str {
    match score {
        s if s >= 85.0 => "Strong match",
        s if s >= 70.0 => "Good match",
        s if s >= 50.0 => "Partial match",
        _ => "Weak match",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlertKind;
    use crate::pipeline::StageState;

    #[test]
    fn test_score_verdict_bands() {
        assert_eq!(score_verdict(92.0), "Strong match");
        assert_eq!(score_verdict(70.0), "Good match");
        assert_eq!(score_verdict(55.5), "Partial match");
        assert_eq!(score_verdict(10.0), "Weak match");
    }

    #[test]
    fn test_pipeline_report_verdict_and_alerts() {
        let mut record = CandidateRecord::new("cand-1", "job-1");
        record.reject(StageState::Submitted);
        let alert = crate::error::Alert::new(AlertKind::InputTooSparse, "cv too short");
        record.alerts.push(alert.clone());

        let metadata = ReportMetadata::new(vec!["cv.txt".to_string()], 12).with_model_alerts(vec![alert.clone()]);
        let report = EvaluationReport::pipeline(metadata, record, Vec::new());

        assert!(report.verdict().starts_with("Rejected at"));
        assert_eq!(report.all_alerts(), vec![alert]);
        assert_eq!(report.headline_score(), None);
    }

    #[test]
    fn test_empty_document_report() {
        let report = EvaluationReport::documents(ReportMetadata::new(Vec::new(), 0), Vec::new());
        assert_eq!(report.headline_score(), None);
        assert_eq!(report.verdict(), "0 of 0 documents authentic");
    }
}
