//! Session-level emotion statistics and the video interview score

use crate::emotion::fusion::{Emotion, EmotionSample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionStat {
    pub count: usize,
    /// Share of frames, 0-100 with two decimals
    pub percentage: f64,
    /// Mean confidence, three decimals
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSummary {
    pub per_emotion: BTreeMap<Emotion, EmotionStat>,
    pub dominant_emotion: Option<Emotion>,
    pub total_frames: usize,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl EmotionSummary {
    pub fn from_samples(samples: &[EmotionSample]) -> Self {
        let total_frames = samples.len();
        let mut per_emotion = BTreeMap::new();
        let mut dominant: Option<(Emotion, usize)> = None;

        for emotion in Emotion::ALL {
            let matching: Vec<f64> = samples
                .iter()
                .filter(|s| s.emotion == emotion)
                .map(|s| s.confidence as f64)
                .collect();
            let count = matching.len();
            let percentage = if total_frames == 0 {
                0.0
            } else {
                count as f64 / total_frames as f64 * 100.0
            };
            let avg_confidence = if count == 0 {
                0.0
            } else {
                matching.iter().sum::<f64>() / count as f64
            };

            per_emotion.insert(
                emotion,
                EmotionStat {
                    count,
                    percentage: round_to(percentage, 2),
                    avg_confidence: round_to(avg_confidence, 3),
                },
            );

            if count > 0 && dominant.map(|(_, best)| count > best).unwrap_or(true) {
                dominant = Some((emotion, count));
            }
        }

        Self {
            per_emotion,
            dominant_emotion: dominant.map(|(e, _)| e),
            total_frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_frames == 0
    }

    /// Fraction of frames showing `emotion`, in [0, 1]
    pub fn fraction(&self, emotion: Emotion) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.per_emotion
            .get(&emotion)
            .map(|s| s.count as f64 / self.total_frames as f64)
            .unwrap_or(0.0)
    }

    /// Presentation score on 0-100: rewards happy, neutral and surprise
    /// frames and penalizes anger, sadness and fear. Empty sessions score 0.
    pub fn video_score(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let score = 0.4 * self.fraction(Emotion::Happy)
            + 0.3 * self.fraction(Emotion::Neutral)
            + 0.1 * self.fraction(Emotion::Surprise)
            + 0.1 * (1.0 - self.fraction(Emotion::Angry))
            + 0.05 * (1.0 - self.fraction(Emotion::Sad))
            + 0.05 * (1.0 - self.fraction(Emotion::Fear));
        round_to((score * 100.0).clamp(0.0, 100.0), 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(spec: &[(Emotion, f32)]) -> Vec<EmotionSample> {
        spec.iter().map(|(e, c)| EmotionSample::new(*e, *c)).collect()
    }

    #[test]
    fn test_summary_statistics() {
        let summary = EmotionSummary::from_samples(&samples(&[
            (Emotion::Happy, 0.9),
            (Emotion::Happy, 0.7),
            (Emotion::Neutral, 0.6),
        ]));

        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.dominant_emotion, Some(Emotion::Happy));
        let happy = summary.per_emotion[&Emotion::Happy];
        assert_eq!(happy.count, 2);
        assert_eq!(happy.percentage, 66.67);
        assert_eq!(happy.avg_confidence, 0.8);
        assert_eq!(summary.per_emotion[&Emotion::Angry].count, 0);
        assert_eq!(summary.per_emotion.len(), 7);
    }

    #[test]
    fn test_dominant_tie_uses_label_order() {
        let summary = EmotionSummary::from_samples(&samples(&[(Emotion::Sad, 0.9), (Emotion::Fear, 0.9)]));
        assert_eq!(summary.dominant_emotion, Some(Emotion::Fear));
    }

    #[test]
    fn test_video_score() {
        let all_happy = EmotionSummary::from_samples(&samples(&[(Emotion::Happy, 0.9); 4]));
        assert_eq!(all_happy.video_score(), 60.0);

        let all_angry = EmotionSummary::from_samples(&samples(&[(Emotion::Angry, 0.9); 4]));
        assert_eq!(all_angry.video_score(), 10.0);

        let mixed = EmotionSummary::from_samples(&samples(&[(Emotion::Happy, 0.9), (Emotion::Neutral, 0.8)]));
        assert_eq!(mixed.video_score(), 55.0);
    }

    #[test]
    fn test_empty_session() {
        let summary = EmotionSummary::from_samples(&[]);
        assert!(summary.is_empty());
        assert_eq!(summary.dominant_emotion, None);
        assert_eq!(summary.video_score(), 0.0);
    }
}
