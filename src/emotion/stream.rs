//! Bounded producer/consumer channel for live video frames
//!
//! Producers never block: when the buffer is full the frame is dropped.
//! A single consumer on the blocking pool classifies, fuses and smooths
//! frames in FIFO order.

use crate::emotion::fusion::{combine, EmotionClassifier, EmotionSample, Frame, FramePrediction, Smoother};
use crate::error::{AtsGateError, Result};
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// The image-region and landmark classifiers used by a session
#[derive(Clone, Default)]
pub struct EmotionClassifiers {
    pub image: Option<Arc<dyn EmotionClassifier>>,
    pub landmark: Option<Arc<dyn EmotionClassifier>>,
}

impl EmotionClassifiers {
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.landmark.is_none()
    }

    pub fn predict(&self, frame: &Frame) -> FramePrediction {
        FramePrediction {
            image: Self::run(self.image.as_deref(), frame),
            landmark: Self::run(self.landmark.as_deref(), frame),
        }
    }

    fn run(classifier: Option<&dyn EmotionClassifier>, frame: &Frame) -> Option<EmotionSample> {
        let classifier = classifier?;
        match classifier.classify(frame) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Classifier {} failed on frame {}: {}", classifier.name(), frame.index, e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub samples: Vec<EmotionSample>,
    pub dropped_frames: u64,
}

/// Cloneable handle for submitting frames to a running session
#[derive(Clone)]
pub struct FrameProducer {
    sender: mpsc::Sender<Frame>,
    dropped: Arc<AtomicU64>,
}

impl FrameProducer {
    /// Returns false if the frame was dropped.
    pub fn offer(&self, frame: Frame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                debug!("Frame buffer full, dropping frame {}", frame.index);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

pub struct EmotionSession {
    producer: FrameProducer,
    handle: JoinHandle<Vec<EmotionSample>>,
}

impl EmotionSession {
    /// Spawn the consumer; must be called inside a tokio runtime.
    /// Classification is CPU-bound, so it stays off the async workers.
    pub fn start(classifiers: EmotionClassifiers, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Frame>(capacity.max(1));

        let handle = tokio::task::spawn_blocking(move || {
            let mut smoother = Smoother::default();
            let mut samples = Vec::new();
            while let Some(frame) = receiver.blocking_recv() {
                let prediction = classifiers.predict(&frame);
                samples.push(smoother.push(combine(&prediction)));
            }
            samples
        });

        Self {
            producer: FrameProducer {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            handle,
        }
    }

    pub fn producer(&self) -> FrameProducer {
        self.producer.clone()
    }

    pub fn offer(&self, frame: Frame) -> bool {
        self.producer.offer(frame)
    }

    /// Close the session and wait for queued frames. Every cloned producer
    /// must be dropped first or this waits forever.
    pub async fn finish(self) -> Result<SessionOutcome> {
        let dropped = Arc::clone(&self.producer.dropped);
        drop(self.producer);
        let samples = self
            .handle
            .await
            .map_err(|e| AtsGateError::Worker(format!("emotion consumer stopped: {}", e)))?;
        Ok(SessionOutcome {
            samples,
            dropped_frames: dropped.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::fusion::Emotion;
    use parking_lot::Mutex;
    use std::sync::mpsc as std_mpsc;

    struct EvenOddClassifier;

    impl EmotionClassifier for EvenOddClassifier {
        fn name(&self) -> &str {
            "even-odd"
        }

        fn classify(&self, frame: &Frame) -> Result<Option<EmotionSample>> {
            let emotion = if frame.index % 2 == 0 { Emotion::Happy } else { Emotion::Neutral };
            Ok(Some(EmotionSample::new(emotion, 0.9)))
        }
    }

    struct BrokenClassifier;

    impl EmotionClassifier for BrokenClassifier {
        fn name(&self) -> &str {
            "broken"
        }

        fn classify(&self, _frame: &Frame) -> Result<Option<EmotionSample>> {
            Err(AtsGateError::ModelLoading("no weights".to_string()))
        }
    }

    /// Holds frame 0 until `release` is signalled or dropped.
    struct GatedClassifier {
        started: Mutex<std_mpsc::Sender<u64>>,
        release: Mutex<std_mpsc::Receiver<()>>,
    }

    impl EmotionClassifier for GatedClassifier {
        fn name(&self) -> &str {
            "gated"
        }

        fn classify(&self, frame: &Frame) -> Result<Option<EmotionSample>> {
            let _ = self.started.lock().send(frame.index);
            if frame.index == 0 {
                let _ = self.release.lock().recv();
            }
            Ok(Some(EmotionSample::new(Emotion::Neutral, 0.9)))
        }
    }

    fn frame(index: u64) -> Frame {
        Frame {
            index,
            ..Frame::default()
        }
    }

    #[tokio::test]
    async fn test_session_processes_frames_in_order() {
        let classifiers = EmotionClassifiers {
            image: Some(Arc::new(EvenOddClassifier)),
            landmark: Some(Arc::new(BrokenClassifier)),
        };
        let session = EmotionSession::start(classifiers, 16);
        for i in 0..5 {
            assert!(session.offer(frame(i)));
        }

        let outcome = session.finish().await.unwrap();
        assert_eq!(outcome.dropped_frames, 0);
        assert_eq!(outcome.samples.len(), 5);
        assert_eq!(outcome.samples[0].emotion, Emotion::Happy);
        // happy, neutral, happy: majority happy
        assert_eq!(outcome.samples[2].emotion, Emotion::Happy);
    }

    #[tokio::test]
    async fn test_full_buffer_drops_frames() {
        let (started_tx, started_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let classifiers = EmotionClassifiers {
            image: Some(Arc::new(GatedClassifier {
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
            })),
            landmark: None,
        };
        let session = EmotionSession::start(classifiers, 2);

        assert!(session.offer(frame(0)));
        // the consumer is now parked inside frame 0, so only two more fit
        assert_eq!(started_rx.recv().unwrap(), 0);
        let accepted = (1..6).filter(|i| session.offer(frame(*i))).count();
        assert_eq!(accepted, 2);
        drop(release_tx);

        let outcome = session.finish().await.unwrap();
        assert_eq!(outcome.dropped_frames, 3);
        assert_eq!(outcome.samples.len(), 3);
        assert!(outcome.samples.iter().all(|s| s.emotion == Emotion::Neutral));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_classification_runs_off_the_async_worker() {
        let (started_tx, started_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let classifiers = EmotionClassifiers {
            image: Some(Arc::new(GatedClassifier {
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
            })),
            landmark: None,
        };
        let session = EmotionSession::start(classifiers, 4);
        assert!(session.offer(frame(0)));
        assert_eq!(started_rx.recv().unwrap(), 0);

        // the only runtime thread still makes progress while frame 0 is held
        let ticker = tokio::spawn(async { 7u8 });
        assert_eq!(ticker.await.unwrap(), 7);

        release_tx.send(()).unwrap();
        let outcome = session.finish().await.unwrap();
        assert_eq!(outcome.samples.len(), 1);
    }
}
