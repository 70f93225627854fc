use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumCount, EnumIter, EnumString};

/// Facial emotion classes, declared in the index order of the classifier output.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
)]
pub enum EmotionLabel {
    Angry,
    Disgusted,
    Fearful,
    Happy,
    Neutral,
    Sad,
    Surprised,
}

impl EmotionLabel {
    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    pub fn names() -> Vec<String> {
        Self::iter().map(|label| label.to_string()).collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DetectEmotionRequest {
    /// Raw base64 or a `data:image/...;base64,` URL.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrackRecommendation {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub image: String,
    pub preview_url: Option<String>,
    pub external_url: String,
    pub duration_ms: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EmotionResponse {
    pub success: bool,
    pub emotion: EmotionLabel,
    pub confidence: f64,
    pub all_predictions: BTreeMap<EmotionLabel, f64>,
    pub recommendations: Vec<TrackRecommendation>,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RecommendationsResponse {
    pub success: bool,
    pub emotion: EmotionLabel,
    pub recommendations: Vec<TrackRecommendation>,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub model_loaded: bool,
    pub face_detector_loaded: bool,
    pub spotify_configured: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiIndex {
    pub message: String,
    pub version: String,
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub success: bool,
}
