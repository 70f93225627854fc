pub mod classify;
pub mod config;
pub mod face;
pub mod model;
pub mod preprocess;

use std::path::PathBuf;
use std::sync::Arc;

use classify::Classification;
use config::VisionConfig;
use face::FaceDetector;
use model::EmotionClassifier;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Invalid image data: {0}")]
    InvalidImage(String),
    #[error("No face detected in the image")]
    NoFaceDetected,
    #[error("Model inference error: {0}")]
    Inference(String),
    #[error("Failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
}

/// Image payload in, emotion out: decode, grayscale, detect, crop, classify.
#[derive(Clone)]
pub struct EmotionPipeline {
    detector: Arc<dyn FaceDetector>,
    classifier: Arc<dyn EmotionClassifier>,
    config: VisionConfig,
}

impl EmotionPipeline {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        classifier: Arc<dyn EmotionClassifier>,
        config: VisionConfig,
    ) -> Self {
        Self {
            detector,
            classifier,
            config,
        }
    }

    pub fn analyze(&self, payload: &str) -> Result<Classification, VisionError> {
        let bytes = preprocess::decode_payload(payload)?;
        let image = preprocess::decode_image(&bytes)?;
        let gray = preprocess::to_grayscale(&image);

        let input = preprocess::preprocess_face(
            &gray,
            self.detector.as_ref(),
            self.config.detector.face_selection,
            self.config.model.input_size,
        )?;

        let probabilities = self.classifier.predict(&input)?;
        Classification::from_probabilities(&probabilities)
    }
}
