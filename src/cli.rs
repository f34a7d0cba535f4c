//! CLI interface for the candidate evaluation pipeline

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ats-gate")]
#[command(about = "Staged candidate evaluation with CV matching, interviews and document checks")]
#[command(
    long_about = "Gate candidates through CV matching, a written interview, a video interview and document authentication, persisting every stage score"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format: console, json, markdown
    #[arg(short = 'f', long, global = true)]
    pub format: Option<String>,

    /// Save the report to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every stage for one candidate, stopping at the first rejection
    Evaluate {
        /// Path to the CV (PDF, TXT, MD)
        #[arg(long)]
        cv: PathBuf,

        /// Path to the job description (PDF, TXT, MD)
        #[arg(short, long)]
        job: PathBuf,

        /// Written interview answers: JSON array or blank-line separated blocks
        #[arg(short, long)]
        answers: Option<PathBuf>,

        /// JSON array of per-frame emotion predictions
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Document image as `type=path` (repeatable)
        #[arg(short, long = "document")]
        documents: Vec<String>,

        /// Candidate identifier (defaults to the CV file name)
        #[arg(long)]
        candidate_id: Option<String>,

        /// Job identifier (defaults to the job file name)
        #[arg(long)]
        job_id: Option<String>,

        /// Candidate record file (overrides the configured one)
        #[arg(long)]
        records: Option<PathBuf>,

        /// Include per-stage detail in console output
        #[arg(long)]
        detailed: bool,
    },

    /// Score a CV against a job description without running the pipeline
    Score {
        /// Path to the CV (PDF, TXT, MD)
        #[arg(long)]
        cv: PathBuf,

        /// Path to the job description (PDF, TXT, MD)
        #[arg(short, long)]
        job: PathBuf,

        /// Include quality metrics in console output
        #[arg(long)]
        detailed: bool,
    },

    /// Document classification and verification
    Documents {
        #[command(subcommand)]
        action: DocumentAction,
    },

    /// Reference corpus management
    References {
        #[command(subcommand)]
        action: ReferenceAction,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum DocumentAction {
    /// Classify a document image by its OCR text
    Classify {
        /// Image file (png, jpg, bmp, tiff) or a base64 text file
        path: PathBuf,
    },

    /// Authenticate documents against the reference corpus
    Verify {
        /// Document image as `type=path` (repeatable)
        #[arg(required = true)]
        documents: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ReferenceAction {
    /// Register a known-authentic document
    Add {
        /// Reference identifier, unique per document type
        id: String,

        /// Document image as `type=path`
        document: String,
    },

    /// List registered references
    List {
        /// Only list references of this type
        #[arg(short = 't', long = "type")]
        doc_type: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,
}

/// Parse and validate output format
pub fn parse_output_format(format: &str) -> Result<crate::config::OutputFormat, String> {
    match format.to_lowercase().as_str() {
        "console" => Ok(crate::config::OutputFormat::Console),
        "json" => Ok(crate::config::OutputFormat::Json),
        "markdown" | "md" => Ok(crate::config::OutputFormat::Markdown),
        _ => Err(format!("Invalid output format: {}. Supported: console, json, markdown", format)),
    }
}

/// Validate file extension
pub fn validate_file_extension(path: &Path, allowed_extensions: &[&str]) -> Result<(), String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => {
            if allowed_extensions.contains(&ext.to_lowercase().as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "Unsupported file extension: .{}. Allowed: {}",
                    ext,
                    allowed_extensions.join(", ")
                ))
            }
        }
        None => Err("File has no extension".to_string()),
    }
}

/// File stem used as a default identifier
pub fn default_identifier(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "unnamed".to_string())
}
