use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use shared::{
    ApiIndex, DetectEmotionRequest, EmotionLabel, EmotionResponse, HealthResponse,
    RecommendationsResponse, TrackRecommendation,
};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::errors::ApiError;
use crate::music::spotify::SpotifyClient;
use crate::state::AppState;

/// Recommendations attached to a detection response.
pub const DETECTION_RECOMMENDATION_CAP: usize = 6;
pub const DEFAULT_RECOMMENDATION_LIMIT: u32 = 10;
/// Spotify search accepts at most 50 results per page.
pub const MAX_RECOMMENDATION_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<u32>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(format!("Invalid query: {}", err)).into()),
    )
    .service(web::resource("/").route(web::get().to(index)))
    .service(web::resource("/health").route(web::get().to(health)))
    .service(web::resource("/detect-emotion").route(web::post().to(detect_emotion)))
    .service(
        web::resource("/get-recommendations/{emotion}").route(web::get().to(get_recommendations)),
    );
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

async fn index() -> HttpResponse {
    let endpoints = BTreeMap::from([
        (
            "/detect-emotion".to_string(),
            "POST - Detect emotion from uploaded image".to_string(),
        ),
        (
            "/get-recommendations/<emotion>".to_string(),
            "GET - Get music recommendations for emotion".to_string(),
        ),
        ("/health".to_string(), "GET - Check API health".to_string()),
    ]);

    HttpResponse::Ok().json(ApiIndex {
        message: "Emotune Backend API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
    })
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: timestamp(),
        model_loaded: state.model_loaded(),
        face_detector_loaded: state.detector_loaded(),
        spotify_configured: state.spotify_configured,
    })
}

/// Provider failures degrade to an empty list so detection still succeeds.
async fn recommendations_or_empty(
    spotify: &SpotifyClient,
    emotion: EmotionLabel,
    limit: u32,
) -> Vec<TrackRecommendation> {
    match spotify.recommendations(emotion, limit).await {
        Ok(tracks) => tracks,
        Err(e) => {
            log::warn!("Spotify recommendations unavailable for {}: {}", emotion, e);
            Vec::new()
        }
    }
}

async fn detect_emotion(
    state: web::Data<AppState>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    // checked before the body so an unloaded model always yields 500
    let pipeline = state.pipeline()?;

    let body = payload
        .to_bytes_limited(state.max_image_bytes)
        .await
        .map_err(|_| ApiError::PayloadTooLarge(state.max_image_bytes))?
        .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {}", e)))?;

    // an empty body or a JSON null carries no image
    let request: DetectEmotionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        DetectEmotionRequest::default()
    } else {
        serde_json::from_slice::<Option<DetectEmotionRequest>>(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?
            .unwrap_or_default()
    };
    let image = request
        .image
        .filter(|image| !image.trim().is_empty())
        .ok_or(ApiError::MissingImage)?;

    let classification = web::block(move || pipeline.analyze(&image))
        .await
        .map_err(|e| ApiError::internal("Error processing request", e))??;

    log::info!(
        "Detected {} with {:.2}% confidence",
        classification.emotion,
        classification.confidence
    );

    let mut recommendations = recommendations_or_empty(
        &state.spotify,
        classification.emotion,
        DEFAULT_RECOMMENDATION_LIMIT,
    )
    .await;
    recommendations.truncate(DETECTION_RECOMMENDATION_CAP);

    Ok(HttpResponse::Ok().json(EmotionResponse {
        success: true,
        emotion: classification.emotion,
        confidence: classification.confidence,
        all_predictions: classification.all_predictions,
        recommendations,
        timestamp: timestamp(),
    }))
}

async fn get_recommendations(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RecommendationQuery>,
) -> Result<HttpResponse, ApiError> {
    let emotion_name = path.into_inner();
    let emotion =
        EmotionLabel::from_str(&emotion_name).map_err(|_| ApiError::InvalidEmotion(emotion_name))?;

    let limit = query.limit.unwrap_or(DEFAULT_RECOMMENDATION_LIMIT);
    if !(1..=MAX_RECOMMENDATION_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_RECOMMENDATION_LIMIT
        )));
    }

    let recommendations = recommendations_or_empty(&state.spotify, emotion, limit).await;

    Ok(HttpResponse::Ok().json(RecommendationsResponse {
        success: true,
        emotion,
        recommendations,
        timestamp: timestamp(),
    }))
}
