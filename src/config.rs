//! Configuration management for the evaluation pipeline

use crate::error::{AtsGateError, Result};
use crate::processing::scoring::ScoringWeights;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub models: ModelConfig,
    pub extraction: ExtractionConfig,
    pub scoring: ScoringConfig,
    pub documents: DocumentConfig,
    pub storage: StorageConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub models_dir: PathBuf,
    /// Model2Vec model directory name under `models_dir`
    pub semantic_model: String,
    pub max_tokens: usize,
    /// Dimension of the hashing encoder used when no semantic model is installed
    pub fallback_dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub language: String,
    pub min_text_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringPreset {
    Standard,
    Enhanced,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub preset: ScoringPreset,
    /// Signal weights used when `preset = "custom"`
    #[serde(default)]
    pub custom_weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub reference_store: PathBuf,
    pub frame_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub records_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub detailed: bool,
    pub color_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Console,
    Json,
    Markdown,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ats-gate");

        Self {
            models: ModelConfig {
                models_dir: data_dir.join("models"),
                semantic_model: "M2V_base_output".to_string(),
                max_tokens: 512,
                fallback_dimension: 256,
            },
            extraction: ExtractionConfig {
                language: "en".to_string(),
                min_text_length: 500,
            },
            scoring: ScoringConfig {
                preset: ScoringPreset::Standard,
                custom_weights: BTreeMap::new(),
            },
            documents: DocumentConfig {
                reference_store: data_dir.join("references.json"),
                frame_buffer: 32,
            },
            storage: StorageConfig {
                records_file: data_dir.join("candidates.json"),
            },
            output: OutputConfig {
                format: OutputFormat::Console,
                detailed: false,
                color_output: true,
            },
        }
    }
}

impl ScoringConfig {
    /// Resolve the configured signal weights, validating custom tables.
    pub fn weights(&self) -> Result<ScoringWeights> {
        match self.preset {
            ScoringPreset::Standard => Ok(ScoringWeights::standard()),
            ScoringPreset::Enhanced => Ok(ScoringWeights::enhanced()),
            ScoringPreset::Custom => ScoringWeights::new(self.custom_weights.clone()),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path, writing defaults there on first run.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| AtsGateError::Configuration(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AtsGateError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("ats-gate")
            .join("config.toml")
    }

    /// Reject configurations that cannot produce a valid score.
    pub fn validate(&self) -> Result<()> {
        self.scoring.weights()?;
        if self.models.max_tokens == 0 {
            return Err(AtsGateError::Configuration(
                "models.max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.models.fallback_dimension == 0 {
            return Err(AtsGateError::Configuration(
                "models.fallback_dimension must be greater than zero".to_string(),
            ));
        }
        if self.documents.frame_buffer == 0 {
            return Err(AtsGateError::Configuration(
                "documents.frame_buffer must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn semantic_model_path(&self) -> PathBuf {
        self.models.models_dir.join(&self.models.semantic_model)
    }
}
