//! Error handling and non-fatal alerts for the evaluation pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtsGateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("File format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid stage transition: {0}")]
    InvalidTransition(String),

    #[error("Insufficient corpus: {0}")]
    InsufficientCorpus(String),

    #[error("Embedding generation error: {0}")]
    Embedding(String),

    #[error("Model loading error: {0}")]
    ModelLoading(String),

    #[error("Candidate record not found: {0}")]
    RecordNotFound(String),

    #[error("Candidate record already exists: {0}")]
    DuplicateRecord(String),

    #[error("Reference already registered: {0}")]
    DuplicateReference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Background worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, AtsGateError>;

/// Convert anyhow errors raised by model collaborators
impl From<anyhow::Error> for AtsGateError {
    fn from(err: anyhow::Error) -> Self {
        AtsGateError::ModelLoading(err.to_string())
    }
}

/// Kinds of degraded-but-recoverable conditions surfaced next to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ExtractionDegraded,
    InputTooSparse,
    ReferenceMissing,
    LowSimilarity,
    LowOcrConfidence,
    InsufficientText,
    TypeMismatch,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertKind::ExtractionDegraded => "extraction degraded",
            AlertKind::InputTooSparse => "input too sparse",
            AlertKind::ReferenceMissing => "reference missing",
            AlertKind::LowSimilarity => "low similarity",
            AlertKind::LowOcrConfidence => "low OCR confidence",
            AlertKind::InsufficientText => "insufficient text",
            AlertKind::TypeMismatch => "document type mismatch",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// True if any alert of `kind` is present
pub fn has_alert(alerts: &[Alert], kind: AlertKind) -> bool {
    alerts.iter().any(|a| a.kind == kind)
}
