//! Integration tests for the candidate evaluation pipeline

use ats_gate::documents::features::{BoundingBox, OcrBlock, OcrEngine};
use ats_gate::documents::{DocumentEngine, DocumentSubmission, DocumentType, ReferenceStore};
use ats_gate::emotion::EmotionSummary;
use ats_gate::error::{has_alert, AlertKind, AtsGateError, Result};
use ats_gate::input::InputManager;
use ats_gate::interview::InterviewTranscript;
use ats_gate::models::ModelProvider;
use ats_gate::config::OutputFormat;
use ats_gate::output::{EvaluationReport, ReportGenerator, ReportMetadata};
use ats_gate::pipeline::{
    Application, CandidateRecord, CandidateStatus, JsonFileRecordStore, ModelStageScorer, Pipeline,
    RecordStore, StageDetail, StageGate, StageInput, StageScore, StageScorer, StageState, VideoEvidence,
};
use ats_gate::processing::embeddings::{BackendKind, EmbeddingBackend, HashingBackend};
use ats_gate::processing::scoring::{ScoringEngine, ScoringWeights};
use image::{DynamicImage, GrayImage, Luma};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const JOB_TEXT: &str = "Senior Backend Engineer. We need strong Python and Rust skills, \
    PostgreSQL and Redis databases, Docker and Kubernetes on AWS. \
    Experience with Django or FastAPI is a plus. Good communication and leadership.";

const CARD_TEXT: &str = "Royaume du Maroc Carte Nationale d'Identité numéro AB123456 née le 01 janvier 1990 à Rabat";

struct FixedScorer {
    cv: f64,
    written: f64,
    video: f64,
    documents: f64,
}

impl StageScorer for FixedScorer {
    fn score_cv(&self, _cv_text: &str, _job_text: &str) -> Result<StageScore> {
        Ok(StageScore {
            score: self.cv,
            detail: StageDetail::CvMatch {
                breakdown: None,
                questions: vec!["Why this role?".to_string()],
            },
            alerts: Vec::new(),
        })
    }

    fn score_written(&self, _questions: &[String], _answers: &[String]) -> Result<StageScore> {
        Ok(StageScore {
            score: self.written,
            detail: StageDetail::Written(InterviewTranscript::default()),
            alerts: Vec::new(),
        })
    }

    fn score_video(&self, _evidence: VideoEvidence) -> Result<StageScore> {
        Ok(StageScore {
            score: self.video,
            detail: StageDetail::Video(EmotionSummary::from_samples(&[])),
            alerts: Vec::new(),
        })
    }

    fn score_documents(&self, _submissions: Vec<DocumentSubmission>) -> Result<StageScore> {
        Ok(StageScore {
            score: self.documents,
            detail: StageDetail::Documents(Vec::new()),
            alerts: Vec::new(),
        })
    }
}

struct OfflineBackend;

impl EmbeddingBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Semantic
    }

    fn dimension(&self) -> usize {
        16
    }

    fn max_tokens(&self) -> usize {
        128
    }

    fn encode(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AtsGateError::Embedding("model offline".to_string()))
    }
}

struct FixedOcr(&'static str);

impl OcrEngine for FixedOcr {
    fn name(&self) -> &str {
        "fixed"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrBlock>> {
        Ok(vec![OcrBlock {
            text: self.0.to_string(),
            bbox: BoundingBox {
                x_min: 2.0,
                y_min: 2.0,
                x_max: 60.0,
                y_max: 12.0,
            },
            confidence: 0.93,
        }])
    }
}

fn application() -> Application {
    Application {
        cv_text: "cv".to_string(),
        job_text: "job".to_string(),
        answers: Vec::new(),
        video: VideoEvidence::Predictions(Vec::new()),
        documents: Vec::new(),
    }
}

fn write_scan(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    GrayImage::from_fn(64, 40, |x, y| if (x / 8 + y / 8) % 2 == 0 { Luma([30]) } else { Luma([220]) })
        .save(&path)
        .unwrap();
    path
}

#[tokio::test]
async fn test_text_extraction_from_txt_and_markdown() {
    let temp_dir = TempDir::new().unwrap();
    let txt = temp_dir.path().join("cv.txt");
    let md = temp_dir.path().join("cv.md");
    std::fs::write(&txt, "Jane Doe\nSoftware Engineer\nReact, Node.js").unwrap();
    std::fs::write(&md, "# Jane Doe\n\n## Experience\n\n**Software Engineer** using *React* and Node.js\n").unwrap();

    let mut manager = InputManager::new();
    let text = manager.extract_text(&txt).await.unwrap();
    assert!(text.contains("Software Engineer"));

    let text = manager.extract_text(&md).await.unwrap();
    assert!(text.contains("Jane Doe"));
    assert!(text.contains("Software Engineer using React and Node.js"));
    assert!(!text.contains("**"));
    assert!(!text.contains("##"));
    assert_eq!(manager.cache_size(), 2);
}

#[tokio::test]
async fn test_unsupported_and_missing_files() {
    let temp_dir = TempDir::new().unwrap();
    let unsupported = temp_dir.path().join("cv.xyz");
    std::fs::write(&unsupported, "data").unwrap();

    let mut manager = InputManager::new();
    assert!(manager.extract_text(&unsupported).await.is_err());
    assert!(manager.extract_text(&temp_dir.path().join("nope.txt")).await.is_err());
}

#[test]
fn test_matching_cv_outscores_unrelated_cv() {
    let engine = ScoringEngine::new(Arc::new(ModelProvider::lightweight()), ScoringWeights::standard()).unwrap();

    let matching = engine.score_texts(JOB_TEXT, JOB_TEXT).unwrap();
    let unrelated = engine
        .score_texts("I enjoy gardening and painting landscapes on quiet weekends.", JOB_TEXT)
        .unwrap();

    assert!(matching.ats_score > 90.0);
    assert!(matching.ats_score <= 100.0);
    assert!(unrelated.ats_score >= 0.0);
    assert!(unrelated.ats_score < matching.ats_score);
    assert!(!unrelated.missing_skills.is_empty());
    assert!(matching.missing_skills.values().all(Vec::is_empty));
}

#[test]
fn test_pipeline_persists_every_stage_to_disk() {
    let temp_dir = TempDir::new().unwrap();
    let records_path = temp_dir.path().join("records").join("candidates.json");

    let scorer = FixedScorer {
        cv: 75.0,
        written: 65.0,
        video: 70.0,
        documents: 90.0,
    };
    let store = Arc::new(JsonFileRecordStore::open(&records_path).unwrap());
    let pipeline = Pipeline::new(StageGate::new(Arc::new(scorer)), store);

    pipeline.submit("cand-1", "job-1").unwrap();
    let (record, outcomes) = pipeline.evaluate("cand-1", application()).unwrap();
    assert_eq!(outcomes.len(), 5);
    assert_eq!(record.stage, StageState::Advanced);
    assert_eq!(record.final_score, Some(74.25));

    let reopened = JsonFileRecordStore::open(&records_path).unwrap();
    let persisted = reopened.get("cand-1").unwrap();
    assert_eq!(persisted.status, CandidateStatus::Advanced);
    assert_eq!(persisted.cv_match_score, Some(75.0));
    assert_eq!(persisted.documents_score, Some(90.0));
    assert_eq!(persisted.questions, vec!["Why this role?".to_string()]);

    assert!(matches!(
        pipeline.submit("cand-1", "job-1"),
        Err(AtsGateError::DuplicateRecord(_))
    ));
}

#[test]
fn test_rejection_stops_pipeline_and_keeps_score() {
    let scorer = FixedScorer {
        cv: 72.0,
        written: 55.0,
        video: 100.0,
        documents: 100.0,
    };
    let store = Arc::new(ats_gate::pipeline::InMemoryRecordStore::new());
    let pipeline = Pipeline::new(StageGate::new(Arc::new(scorer)), store);

    pipeline.submit("cand-2", "job-1").unwrap();
    let (record, outcomes) = pipeline.evaluate("cand-2", application()).unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[1].rejected());
    assert_eq!(record.status, CandidateStatus::Rejected);
    assert_eq!(record.rejected_from, Some(StageState::CvMatched));
    assert_eq!(record.written_interview_score, Some(55.0));
    assert!(record.video_interview_score.is_none());

    let report = EvaluationReport::pipeline(ReportMetadata::new(Vec::new(), 1), record, outcomes);
    let json = ReportGenerator::new().generate_report(&report, &OutputFormat::Json).unwrap();
    assert!(json.contains("\"rejected_from\": \"cv_matched\""));
}

#[test]
fn test_model_scorer_gates_on_written_interview() {
    let models = Arc::new(ModelProvider::lightweight());
    let engine = ScoringEngine::new(Arc::clone(&models), ScoringWeights::standard()).unwrap();
    let documents = DocumentEngine::new(Arc::clone(&models), Arc::new(ReferenceStore::in_memory()));
    let scorer = ModelStageScorer::new(engine, documents);
    let pipeline = Pipeline::new(
        StageGate::new(Arc::new(scorer)),
        Arc::new(ats_gate::pipeline::InMemoryRecordStore::new()),
    );

    pipeline.submit("cand-3", "job-2").unwrap();
    let mut application = application();
    application.cv_text = JOB_TEXT.to_string();
    application.job_text = JOB_TEXT.to_string();

    let (record, outcomes) = pipeline.evaluate("cand-3", application).unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].state, StageState::CvMatched);
    assert!(record.cv_match_score.unwrap() >= 70.0);
    assert!(!record.questions.is_empty());
    assert!(record.questions.len() <= 4);

    // every question unanswered scores the short-answer floor
    assert!((record.written_interview_score.unwrap() - 30.0).abs() < 1e-9);
    assert_eq!(record.stage, StageState::Rejected);
    assert!(has_alert(&record.alerts, AlertKind::InputTooSparse));
}

#[test]
fn test_embedding_outage_degrades_written_stage() {
    let models = Arc::new(
        ModelProvider::builder()
            .semantic_backend(Arc::new(OfflineBackend))
            .build()
            .unwrap(),
    );
    let engine = ScoringEngine::new(Arc::clone(&models), ScoringWeights::standard()).unwrap();
    let documents = DocumentEngine::new(Arc::clone(&models), Arc::new(ReferenceStore::in_memory()));
    let store = Arc::new(ats_gate::pipeline::InMemoryRecordStore::new());
    let pipeline = Pipeline::new(
        StageGate::new(Arc::new(ModelStageScorer::new(engine, documents))),
        Arc::clone(&store) as Arc<dyn RecordStore>,
    );

    let mut record = CandidateRecord::new("cand-5", "job-3");
    record.stage = StageState::CvMatched;
    record.cv_match_score = Some(80.0);
    record.questions = vec!["Why this role?".to_string(), "Describe a recent project.".to_string()];
    store.create(record).unwrap();

    let answers = vec![
        "I have wanted to build hiring tools since my first internship in a small HR team".to_string(),
        "Last year I migrated our document pipeline to Rust and halved the processing time".to_string(),
    ];
    let outcome = pipeline
        .advance("cand-5", StageInput::WrittenInterview { answers })
        .unwrap();
    assert!((outcome.score - 50.0).abs() < 1e-9);
    assert!(has_alert(&outcome.alerts, AlertKind::ExtractionDegraded));

    let persisted = store.get("cand-5").unwrap();
    assert_eq!(persisted.written_interview_score, Some(50.0));
    assert_eq!(persisted.interview.questions.len(), 2);
}

#[tokio::test]
async fn test_registered_document_authenticates_itself() {
    let temp_dir = TempDir::new().unwrap();
    let scan = write_scan(temp_dir.path(), "id.png");
    let store_path = temp_dir.path().join("references.json");

    let models = Arc::new(
        ModelProvider::builder()
            .semantic_backend(Arc::new(HashingBackend::new(64, 128)))
            .ocr(Arc::new(FixedOcr(CARD_TEXT)))
            .build()
            .unwrap(),
    );
    let engine = DocumentEngine::new(Arc::clone(&models), Arc::new(ReferenceStore::open(&store_path).unwrap()));
    let manager = InputManager::new();
    let spec = format!("cin={}", scan.display());

    let entry = engine.register("cin-ref-1", manager.read_document(&spec).await.unwrap()).unwrap();
    assert_eq!(entry.features.document_type, DocumentType::Cin);
    assert!(matches!(
        engine.register("cin-ref-1", manager.read_document(&spec).await.unwrap()),
        Err(AtsGateError::DuplicateReference(_))
    ));

    // a fresh engine sees the persisted corpus
    let engine = DocumentEngine::new(models, Arc::new(ReferenceStore::open(&store_path).unwrap()));
    let verdict = engine.verify(manager.read_document(&spec).await.unwrap());
    assert!(verdict.result.is_authentic);
    assert_eq!(verdict.classified_type, DocumentType::Cin);
    assert_eq!(verdict.result.best_match_id.as_deref(), Some("cin-ref-1"));
    assert!(verdict.score() >= 85.0);
    assert!(verdict.result.alerts.is_empty());
}

#[tokio::test]
async fn test_unreadable_document_against_empty_store() {
    let temp_dir = TempDir::new().unwrap();
    let scan = write_scan(temp_dir.path(), "mystery.png");

    let engine = DocumentEngine::new(
        Arc::new(ModelProvider::lightweight()),
        Arc::new(ReferenceStore::in_memory()),
    );
    let submission = InputManager::new()
        .read_document(&scan.display().to_string())
        .await
        .unwrap();
    assert!(submission.declared_type.is_none());

    let verdict = engine.verify(submission);
    assert_eq!(verdict.classified_type, DocumentType::Unknown);
    assert!(!verdict.result.is_authentic);
    assert_eq!(verdict.score(), 0.0);
    assert!(has_alert(&verdict.result.alerts, AlertKind::ReferenceMissing));
    assert!(has_alert(&verdict.result.alerts, AlertKind::ExtractionDegraded));
    assert!(has_alert(&verdict.result.alerts, AlertKind::InsufficientText));
}
