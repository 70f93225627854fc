use serde::{Deserialize, Serialize};
use std::path::Path;

use super::face::FaceSelection;
use crate::config::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub detector: DetectorConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Size ratio between consecutive pyramid levels (> 1.0).
    pub scale_factor: f32,
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub slide_window_step: u32,
    pub face_selection: FaceSelection,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.3,
            min_face_size: 20,
            score_threshold: 2.0,
            slide_window_step: 4,
            face_selection: FaceSelection::First,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub input_size: u32,
    pub apply_softmax: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: 48,
            apply_softmax: false,
        }
    }
}

impl VisionConfig {
    /// Reads the YAML tuning file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!(
                "Vision config not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: VisionConfig = serde_yaml::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.detector.scale_factor > 1.0) {
            return Err(ConfigError::Invalid {
                key: "detector.scale_factor",
                reason: format!("must be greater than 1.0, got {}", self.detector.scale_factor),
            });
        }
        // rustface panics on a non-positive threshold
        if !(self.detector.score_threshold > 0.0 && self.detector.score_threshold.is_finite()) {
            return Err(ConfigError::Invalid {
                key: "detector.score_threshold",
                reason: format!(
                    "must be a positive number, got {}",
                    self.detector.score_threshold
                ),
            });
        }
        if self.detector.slide_window_step == 0 {
            return Err(ConfigError::Invalid {
                key: "detector.slide_window_step",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.model.input_size == 0 {
            return Err(ConfigError::Invalid {
                key: "model.input_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
