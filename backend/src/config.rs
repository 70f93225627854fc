use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::vision::config::VisionConfig;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MODEL_PATH: &str = "model/emotion_model.onnx";
const DEFAULT_FACE_MODEL_PATH: &str = "model/seeta_fd_frontal_v1.0.bin";
const DEFAULT_VISION_CONFIG_PATH: &str = "config/vision.yaml";
const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_MARKET: &str = "US";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Failed to read vision config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse vision config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub accounts_url: Url,
    pub api_url: Url,
    pub market: String,
    pub timeout: Duration,
}

impl SpotifyConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub model_path: PathBuf,
    pub face_model_path: PathBuf,
    pub vision: VisionConfig,
    pub spotify: SpotifyConfig,
    pub max_image_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let client_id = get("SPOTIFY_CLIENT_ID").ok_or(ConfigError::Missing("SPOTIFY_CLIENT_ID"))?;
        let client_secret =
            get("SPOTIFY_CLIENT_SECRET").ok_or(ConfigError::Missing("SPOTIFY_CLIENT_SECRET"))?;

        let port = match get("PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let accounts_url = parse_url(
            "SPOTIFY_ACCOUNTS_URL",
            &get("SPOTIFY_ACCOUNTS_URL").unwrap_or_else(|| DEFAULT_ACCOUNTS_URL.to_string()),
        )?;
        let api_url = parse_url(
            "SPOTIFY_API_URL",
            &get("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;

        let timeout_secs = match get("SPOTIFY_TIMEOUT_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "SPOTIFY_TIMEOUT_SECS",
                    reason: format!("expected a positive number of seconds, got '{}'", value),
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let max_image_bytes = match get("MAX_IMAGE_BYTES") {
            Some(value) => value.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                key: "MAX_IMAGE_BYTES",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_IMAGE_BYTES,
        };

        let vision_path = PathBuf::from(
            get("VISION_CONFIG_PATH").unwrap_or_else(|| DEFAULT_VISION_CONFIG_PATH.to_string()),
        );
        let vision = VisionConfig::load(&vision_path)?;

        Ok(Self {
            port,
            model_path: PathBuf::from(
                get("EMOTION_MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            ),
            face_model_path: PathBuf::from(
                get("FACE_MODEL_PATH").unwrap_or_else(|| DEFAULT_FACE_MODEL_PATH.to_string()),
            ),
            vision,
            spotify: SpotifyConfig {
                client_id,
                client_secret,
                accounts_url,
                api_url,
                market: get("SPOTIFY_MARKET").unwrap_or_else(|| DEFAULT_MARKET.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            max_image_bytes,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDENTIALS: [(&str, &str); 3] = [
        ("SPOTIFY_CLIENT_ID", "id"),
        ("SPOTIFY_CLIENT_SECRET", "secret"),
        ("VISION_CONFIG_PATH", "/nonexistent/vision.yaml"),
    ];

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let config = AppConfig::from_lookup(lookup_from(&CREDENTIALS)).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.model_path, PathBuf::from("model/emotion_model.onnx"));
        assert_eq!(config.spotify.market, "US");
        assert_eq!(config.spotify.timeout, Duration::from_secs(10));
        assert_eq!(config.spotify.accounts_url.as_str(), "https://accounts.spotify.com/");
        assert!(config.spotify.is_configured());
        assert_eq!(config.max_image_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let err = AppConfig::from_lookup(lookup_from(&[("SPOTIFY_CLIENT_ID", "id")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SPOTIFY_CLIENT_SECRET")));

        let err = AppConfig::from_lookup(lookup_from(&[
            ("SPOTIFY_CLIENT_ID", "  "),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SPOTIFY_CLIENT_ID")));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.extend([
            ("PORT", "8080"),
            ("SPOTIFY_MARKET", "GB"),
            ("SPOTIFY_TIMEOUT_SECS", "3"),
            ("SPOTIFY_API_URL", "http://127.0.0.1:9999/v1"),
            ("EMOTION_MODEL_PATH", "/models/emotion.pt"),
        ]);
        let config = AppConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.spotify.market, "GB");
        assert_eq!(config.spotify.timeout, Duration::from_secs(3));
        assert_eq!(config.spotify.api_url.as_str(), "http://127.0.0.1:9999/v1");
        assert_eq!(config.model_path, PathBuf::from("/models/emotion.pt"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("PORT", "not-a-port"));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));

        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("SPOTIFY_TIMEOUT_SECS", "0"));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid { key: "SPOTIFY_TIMEOUT_SECS", .. })
        ));

        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("SPOTIFY_ACCOUNTS_URL", "not a url"));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid { key: "SPOTIFY_ACCOUNTS_URL", .. })
        ));
    }
}
