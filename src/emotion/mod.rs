//! Facial emotion fusion for the video interview stage

pub mod fusion;
pub mod stream;
pub mod summary;

pub use fusion::{Emotion, EmotionClassifier, EmotionSample, Frame, FramePrediction};
pub use stream::{EmotionClassifiers, EmotionSession, FrameProducer};
pub use summary::EmotionSummary;
