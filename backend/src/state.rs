use std::sync::Arc;

use crate::errors::ApiError;
use crate::music::spotify::SpotifyClient;
use crate::vision::EmotionPipeline;
use crate::vision::config::VisionConfig;
use crate::vision::face::FaceDetector;
use crate::vision::model::EmotionClassifier;

/// Handles built once at startup and shared read-only by every worker.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Option<Arc<dyn EmotionClassifier>>,
    pub detector: Option<Arc<dyn FaceDetector>>,
    pub vision: VisionConfig,
    pub spotify: SpotifyClient,
    pub spotify_configured: bool,
    /// Upper bound on a detection request body.
    pub max_image_bytes: usize,
}

impl AppState {
    pub fn model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn detector_loaded(&self) -> bool {
        self.detector.is_some()
    }

    /// Fails with a server error when either startup artifact is missing.
    pub fn pipeline(&self) -> Result<EmotionPipeline, ApiError> {
        let classifier = self.classifier.clone().ok_or(ApiError::ModelNotLoaded)?;
        let detector = self.detector.clone().ok_or(ApiError::DetectorNotLoaded)?;
        Ok(EmotionPipeline::new(detector, classifier, self.vision.clone()))
    }
}
