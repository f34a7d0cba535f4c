//! Per-frame fusion of two emotion classifiers and temporal smoothing

use crate::error::{AtsGateError, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

pub const IMAGE_WEIGHT: f32 = 0.6;
pub const LANDMARK_WEIGHT: f32 = 0.4;
pub const SMOOTHING_WINDOW: usize = 10;
pub const CONFIDENCE_FLOOR: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = AtsGateError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == lowered)
            .ok_or_else(|| AtsGateError::InvalidInput(format!("Unknown emotion label: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    pub emotion: Emotion,
    pub confidence: f32,
}

impl EmotionSample {
    pub fn new(emotion: Emotion, confidence: f32) -> Self {
        Self {
            emotion,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Raw outputs of the image-region and landmark classifiers for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FramePrediction {
    #[serde(default)]
    pub image: Option<EmotionSample>,
    #[serde(default)]
    pub landmark: Option<EmotionSample>,
}

/// One captured video frame
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub index: u64,
    pub face: Option<GrayImage>,
    pub landmarks: Vec<[f32; 3]>,
}

/// Emotion classifier collaborator. The image-region and landmark models
/// are two instances of this contract.
pub trait EmotionClassifier: Send + Sync {
    fn name(&self) -> &str;
    /// `Ok(None)` when the frame carries nothing this classifier can use
    fn classify(&self, frame: &Frame) -> Result<Option<EmotionSample>>;
}

/// Fuse both predictions for a frame.
///
/// Agreeing predictions are averaged 0.6/0.4; disagreeing ones resolve to
/// the more confident (landmark on an exact tie). A prediction with zero
/// confidence counts as missing, and no prediction at all is neutral 0.5.
pub fn combine(prediction: &FramePrediction) -> EmotionSample {
    let image = prediction.image.filter(|p| p.confidence > 0.0);
    let landmark = prediction.landmark.filter(|p| p.confidence > 0.0);

    match (image, landmark) {
        (Some(i), Some(l)) if i.emotion == l.emotion => EmotionSample::new(
            i.emotion,
            IMAGE_WEIGHT * i.confidence + LANDMARK_WEIGHT * l.confidence,
        ),
        (Some(i), Some(l)) => {
            if i.confidence > l.confidence {
                i
            } else {
                l
            }
        }
        (Some(i), None) => i,
        (None, Some(l)) => l,
        (None, None) => EmotionSample::new(Emotion::Neutral, 0.5),
    }
}

/// Sliding-window majority vote over confident samples
#[derive(Debug, Clone)]
pub struct Smoother {
    window: VecDeque<EmotionSample>,
    capacity: usize,
    floor: f32,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(SMOOTHING_WINDOW, CONFIDENCE_FLOOR)
    }
}

impl Smoother {
    pub fn new(capacity: usize, floor: f32) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            floor,
        }
    }

    /// Push a sample and return the smoothed estimate. Among window entries
    /// at or above the floor, the most frequent emotion wins (earliest seen
    /// on ties) with its mean confidence; with no survivors the input is
    /// returned unchanged.
    pub fn push(&mut self, sample: EmotionSample) -> EmotionSample {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);

        let mut tallies: Vec<(Emotion, usize, f32)> = Vec::new();
        for entry in self.window.iter().filter(|s| s.confidence >= self.floor) {
            match tallies.iter_mut().find(|(e, _, _)| *e == entry.emotion) {
                Some(tally) => {
                    tally.1 += 1;
                    tally.2 += entry.confidence;
                }
                None => tallies.push((entry.emotion, 1, entry.confidence)),
            }
        }

        let mut best: Option<(Emotion, usize, f32)> = None;
        for tally in tallies {
            if best.map(|b| tally.1 > b.1).unwrap_or(true) {
                best = Some(tally);
            }
        }

        match best {
            Some((emotion, count, total)) => EmotionSample::new(emotion, total / count as f32),
            None => sample,
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// Fuse and smooth a whole session of frame predictions
pub fn fuse_session(predictions: &[FramePrediction]) -> Vec<EmotionSample> {
    let mut smoother = Smoother::default();
    predictions.iter().map(|p| smoother.push(combine(p))).collect()
}
