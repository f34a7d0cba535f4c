//! Interview question generation and written answer scoring

pub mod questions;
pub mod written;

pub use questions::{generate_questions, GENERAL_QUESTIONS, VIDEO_QUESTIONS};
pub use written::{InterviewTranscript, QuestionAnswer, WrittenInterviewScorer};
