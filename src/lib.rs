//! Staged candidate evaluation library
//!
//! Candidates move through CV matching, a written interview, a video
//! interview and document verification; each stage is scored, persisted and
//! then compared against its threshold.

pub mod cli;
pub mod config;
pub mod documents;
pub mod emotion;
pub mod error;
pub mod input;
pub mod interview;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod processing;
pub mod storage;

pub use config::Config;
pub use error::{Alert, AlertKind, AtsGateError, Result};
pub use models::ModelProvider;
