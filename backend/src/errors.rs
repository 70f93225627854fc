use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::{EmotionLabel, ErrorResponse};

use crate::vision::VisionError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Emotion detection model not loaded. Please check your model file.")]
    ModelNotLoaded,
    #[error("Face detector not loaded. Please check your face model file.")]
    DetectorNotLoaded,
    #[error("No image data provided")]
    MissingImage,
    #[error("Invalid emotion. Valid emotions: {}", EmotionLabel::names().join(", "))]
    InvalidEmotion(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Image payload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),
    /// Only `context` reaches the client; `detail` is logged.
    #[error("{context}")]
    Internal {
        context: &'static str,
        detail: String,
    },
}

impl ApiError {
    pub fn internal(context: &'static str, detail: impl ToString) -> Self {
        ApiError::Internal {
            context,
            detail: detail.to_string(),
        }
    }
}

impl From<VisionError> for ApiError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::InvalidImage(_) | VisionError::NoFaceDetected => {
                ApiError::BadRequest(err.to_string())
            }
            VisionError::Inference(_) | VisionError::ModelLoad { .. } => {
                ApiError::internal("Error processing request", err)
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::InvalidEmotion(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ModelNotLoaded | ApiError::DetectorNotLoaded | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Internal { context, detail } => log::error!("{}: {}", context, detail),
            ApiError::InvalidEmotion(emotion) => log::info!("Rejected unknown emotion '{}'", emotion),
            other => log::warn!("{}", other),
        }

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            success: false,
        })
    }
}
