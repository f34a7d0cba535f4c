//! ats-gate: staged candidate evaluation from the command line

use ats_gate::cli::{self, Cli, Commands, ConfigAction, DocumentAction, ReferenceAction};
use ats_gate::config::{Config, OutputFormat};
use ats_gate::documents::{DocumentEngine, DocumentType, FeatureExtractor, ReferenceStore};
use ats_gate::emotion::{EmotionSession, EmotionSummary};
use ats_gate::error::{AtsGateError, Result};
use ats_gate::input::InputManager;
use ats_gate::interview::generate_questions;
use ats_gate::models::ModelProvider;
use ats_gate::output::{save_report_to_file, EvaluationReport, ReportGenerator, ReportMetadata};
use ats_gate::pipeline::{Application, JsonFileRecordStore, ModelStageScorer, Pipeline, StageGate, VideoEvidence};
use ats_gate::processing::scoring::ScoringEngine;
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Instant;

const TEXT_EXTENSIONS: [&str; 4] = ["pdf", "txt", "md", "markdown"];

struct OutputOptions {
    format: OutputFormat,
    save: Option<PathBuf>,
    use_colors: bool,
    detailed: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let config = match Config::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli, config, config_path).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run_command(cli: Cli, config: Config, config_path: PathBuf) -> Result<()> {
    let format = match &cli.format {
        Some(format) => cli::parse_output_format(format).map_err(AtsGateError::InvalidInput)?,
        None => config.output.format,
    };
    let output = |detailed: bool| OutputOptions {
        format,
        save: cli.output.clone(),
        use_colors: config.output.color_output,
        detailed: detailed || config.output.detailed,
    };

    match cli.command {
        Commands::Evaluate {
            cv,
            job,
            answers,
            frames,
            documents,
            candidate_id,
            job_id,
            records,
            detailed,
        } => {
            let started = Instant::now();
            check_text_file(&cv, "CV")?;
            check_text_file(&job, "Job description")?;

            let candidate_id = candidate_id.unwrap_or_else(|| cli::default_identifier(&cv));
            let job_id = job_id.unwrap_or_else(|| cli::default_identifier(&job));
            let records_path = records.unwrap_or_else(|| config.storage.records_file.clone());

            println!("🚀 Candidate evaluation");
            println!("👤 Candidate: {} | 💼 Job: {}", candidate_id, job_id);
            println!("📄 CV: {}", cv.display());
            println!("💼 Job Description: {}", job.display());

            let mut input_manager = InputManager::new();
            println!("\n📂 Loading inputs...");
            let cv_text = input_manager.extract_text(&cv).await?;
            let job_text = input_manager.extract_text(&job).await?;
            let answers = match &answers {
                Some(path) => input_manager.read_answers(path).await?,
                None => {
                    warn!("No answers file given, the written interview will score unanswered");
                    Vec::new()
                }
            };

            let models = Arc::new(load_models(&config)?);
            let video = load_video_evidence(&input_manager, frames.as_deref(), &models, &config).await?;

            let mut submissions = Vec::with_capacity(documents.len());
            for spec in &documents {
                submissions.push(input_manager.read_document(spec).await?);
            }
            println!(
                "✅ Loaded CV ({} chars), job ({} chars), {} answers, {} documents",
                cv_text.len(),
                job_text.len(),
                answers.len(),
                submissions.len()
            );

            let scorer = ModelStageScorer::new(
                scoring_engine(&config, Arc::clone(&models))?,
                DocumentEngine::new(Arc::clone(&models), open_reference_store(&config)?),
            );
            let record_store = Arc::new(JsonFileRecordStore::open(&records_path)?);
            let pipeline = Pipeline::new(StageGate::new(Arc::new(scorer)), record_store);

            println!("\n🔄 Running stages...");
            pipeline.submit(&candidate_id, &job_id)?;
            let application = Application {
                cv_text,
                job_text,
                answers,
                video,
                documents: submissions,
            };
            let (record, outcomes) = pipeline.evaluate(&candidate_id, application)?;
            info!(
                "Candidate {} finished in state {} after {} stages",
                record.candidate_id,
                record.stage,
                outcomes.len()
            );
            println!("💾 Record saved to {}", records_path.display());

            let metadata = ReportMetadata::new(
                vec![cv.display().to_string(), job.display().to_string()],
                started.elapsed().as_millis() as u64,
            )
            .with_model_alerts(models.alerts.clone());
            emit_report(&EvaluationReport::pipeline(metadata, record, outcomes), &output(detailed))?;
        }

        Commands::Score { cv, job, detailed } => {
            let started = Instant::now();
            check_text_file(&cv, "CV")?;
            check_text_file(&job, "Job description")?;

            println!("🎯 CV match scoring");
            let mut input_manager = InputManager::new();
            let cv_text = input_manager.extract_text(&cv).await?;
            let job_text = input_manager.extract_text(&job).await?;

            let models = Arc::new(load_models(&config)?);
            let engine = scoring_engine(&config, Arc::clone(&models))?;
            let cv_profile = engine.profile(&cv_text);
            let job_profile = engine.profile(&job_text);
            let breakdown = engine.score(&cv_profile, &job_profile)?;
            let questions = generate_questions(&breakdown, &job_profile);

            let metadata = ReportMetadata::new(
                vec![cv.display().to_string(), job.display().to_string()],
                started.elapsed().as_millis() as u64,
            )
            .with_model_alerts(models.alerts.clone());
            emit_report(&EvaluationReport::cv_match(metadata, breakdown, questions), &output(detailed))?;
        }

        Commands::Documents { action } => {
            let input_manager = InputManager::new();
            let models = Arc::new(load_models(&config)?);
            match action {
                DocumentAction::Classify { path } => {
                    let source = input_manager.read_image(&path).await?;
                    let label = path.display().to_string();
                    let features = FeatureExtractor::new(models).extract(source, None, Some(&label));

                    println!("📄 Document: {}", label);
                    println!("🏷️  Type: {}", features.classified_type);
                    println!("🔍 OCR confidence: {:.1}%", features.ocr_confidence * 100.0);
                    println!("📝 Text length: {} characters", features.metadata.text_length);
                    for alert in &features.alerts {
                        println!("⚠️  {}", alert);
                    }
                }

                DocumentAction::Verify { documents } => {
                    let started = Instant::now();
                    let engine = DocumentEngine::new(Arc::clone(&models), open_reference_store(&config)?);
                    println!("🔐 Verifying {} documents against {} references", documents.len(), engine.store().len());

                    let mut verdicts = Vec::with_capacity(documents.len());
                    for spec in &documents {
                        verdicts.push(engine.verify(input_manager.read_document(spec).await?));
                    }
                    let metadata = ReportMetadata::new(documents.clone(), started.elapsed().as_millis() as u64)
                        .with_model_alerts(models.alerts.clone());
                    emit_report(&EvaluationReport::documents(metadata, verdicts), &output(false))?;
                }
            }
        }

        Commands::References { action } => {
            let store = open_reference_store(&config)?;
            match action {
                ReferenceAction::Add { id, document } => {
                    let input_manager = InputManager::new();
                    let submission = input_manager.read_document(&document).await?;
                    let models = Arc::new(load_models(&config)?);
                    let engine = DocumentEngine::new(models, Arc::clone(&store));

                    let entry = engine.register(&id, submission)?;
                    println!("✅ Registered reference {} as {}", id, entry.features.document_type);
                    println!("🔑 Content hash: {}", entry.content_hash);
                    if entry.features.text_content.is_empty() {
                        println!("⚠️  No text was recognized; text similarity against this reference will be 0");
                    }
                }

                ReferenceAction::List { doc_type } => {
                    let filter = doc_type.as_deref().map(str::parse::<DocumentType>).transpose()?;
                    let snapshot = store.snapshot();
                    println!("📚 Reference corpus ({} references)\n", store.len());
                    for (doc_type, entries) in snapshot.iter() {
                        if filter.map(|f| f != *doc_type).unwrap_or(false) {
                            continue;
                        }
                        println!("🏷️  {} ({})", doc_type, entries.len());
                        for (id, entry) in entries {
                            println!(
                                "  • {} added {} hash {}",
                                id,
                                entry.added_at.format("%Y-%m-%d %H:%M"),
                                &entry.content_hash[..12.min(entry.content_hash.len())]
                            );
                        }
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                println!("⚙️  Current Configuration ({})\n", config_path.display());
                println!("Models Directory: {}", config.models.models_dir.display());
                println!("Semantic Model: {}", config.models.semantic_model);
                println!("Language: {}", config.extraction.language);
                println!("Reference Store: {}", config.documents.reference_store.display());
                println!("Candidate Records: {}", config.storage.records_file.display());
                println!("Frame Buffer: {}", config.documents.frame_buffer);
                println!("\nScoring Weights ({:?}):", config.scoring.preset);
                for (signal, weight) in config.scoring.weights()?.iter() {
                    println!("  {}: {:.1}%", signal, weight * 100.0);
                }
            }

            Some(ConfigAction::Reset) => {
                println!("🔄 Resetting configuration to defaults...");
                Config::default().save_to(&config_path)?;
                println!("✅ Configuration reset successfully!");
            }
        },
    }

    Ok(())
}

fn check_text_file(path: &Path, label: &str) -> Result<()> {
    cli::validate_file_extension(path, &TEXT_EXTENSIONS)
        .map_err(|e| AtsGateError::InvalidInput(format!("{} file: {}", label, e)))
}

fn load_models(config: &Config) -> Result<ModelProvider> {
    let models = ModelProvider::from_config(config)?;
    for alert in &models.alerts {
        warn!("{}", alert);
    }
    Ok(models)
}

fn scoring_engine(config: &Config, models: Arc<ModelProvider>) -> Result<ScoringEngine> {
    Ok(ScoringEngine::new(models, config.scoring.weights()?)?
        .with_language(config.extraction.language.clone())
        .with_min_text_length(config.extraction.min_text_length))
}

fn open_reference_store(config: &Config) -> Result<Arc<ReferenceStore>> {
    Ok(Arc::new(ReferenceStore::open(&config.documents.reference_store)?))
}

/// A directory of frame images is streamed through the emotion classifiers;
/// a file is read as recorded per-frame predictions.
async fn load_video_evidence(
    input_manager: &InputManager,
    frames: Option<&Path>,
    models: &ModelProvider,
    config: &Config,
) -> Result<VideoEvidence> {
    let Some(path) = frames else {
        warn!("No video frames given, the video interview will score 0");
        return Ok(VideoEvidence::Predictions(Vec::new()));
    };

    if !path.is_dir() {
        return Ok(VideoEvidence::Predictions(input_manager.read_frames(path).await?));
    }

    if models.emotion.is_empty() {
        warn!("No emotion classifiers are installed; every frame will read as neutral");
    }
    let session = EmotionSession::start(models.emotion.clone(), config.documents.frame_buffer);
    for frame in input_manager.read_frame_images(path).await? {
        session.offer(frame);
        tokio::task::yield_now().await;
    }
    let outcome = session.finish().await?;
    if outcome.dropped_frames > 0 {
        println!("⚠️  {} frames dropped while the classifiers were busy", outcome.dropped_frames);
    }
    Ok(VideoEvidence::Summary(EmotionSummary::from_samples(&outcome.samples)))
}

fn emit_report(report: &EvaluationReport, options: &OutputOptions) -> Result<()> {
    let generator = ReportGenerator::with_options(options.use_colors, options.detailed, true, true);
    let rendered = generator.generate_report(report, &options.format)?;

    match &options.save {
        Some(path) => {
            let plain = if options.format == OutputFormat::Console {
                ReportGenerator::with_options(false, options.detailed, true, true).generate_report(report, &options.format)?
            } else {
                rendered
            };
            save_report_to_file(&plain, path)?;
            println!("💾 Report saved to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
