mod config;
mod errors;
mod music;
mod routes;
mod state;
mod vision;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::AppConfig;
use music::spotify::SpotifyClient;
use routes::configure_routes;
use state::AppState;
use std::env;
use std::sync::Arc;
use vision::face::{FaceDetector, SeetaFaceDetector};
use vision::model::load_emotion_model;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let classifier = load_emotion_model(&config.model_path, &config.vision.model);

    let detector: Option<Arc<dyn FaceDetector>> =
        match SeetaFaceDetector::load(&config.face_model_path, config.vision.detector.clone()) {
            Ok(detector) => {
                log::info!(
                    "Face detector loaded from {}",
                    config.face_model_path.display()
                );
                Some(Arc::new(detector))
            }
            Err(e) => {
                log::error!("Face detector unavailable: {}", e);
                None
            }
        };

    let spotify = SpotifyClient::new(&config.spotify).map_err(|e| {
        log::error!("Failed to build Spotify client: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let state = AppState {
        classifier,
        detector,
        vision: config.vision.clone(),
        spotify,
        spotify_configured: config.spotify.is_configured(),
        max_image_bytes: config.max_image_bytes,
    };

    if !state.model_loaded() || !state.detector_loaded() {
        log::warn!("Emotion detection is disabled until the model files are in place");
    }

    let bind_address = config.bind_address();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
