//! Text processing and CV scoring module

pub mod text_processor;
pub mod entities;
pub mod embeddings;
pub mod tfidf;
pub mod sentiment;
pub mod experience;
pub mod profile;
pub mod similarity;
pub mod scoring;

pub use profile::TextProfile;
pub use scoring::{ScoreBreakdown, ScoringEngine, ScoringWeights};
