use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use shared::{EmotionLabel, TrackRecommendation};
use std::collections::HashMap;
use thiserror::Error;

use super::queries::query_for;
use crate::config::SpotifyConfig;

#[derive(Error, Debug)]
pub enum SpotifyError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Token request rejected with status {0}")]
    TokenRejected(StatusCode),
    #[error("Search request rejected with status {0}")]
    SearchRejected(StatusCode),
}

#[derive(Debug, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<Option<SpotifyTrack>>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: HashMap<String, String>,
    #[serde(default)]
    duration_ms: u64,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

impl From<SpotifyTrack> for TrackRecommendation {
    fn from(track: SpotifyTrack) -> Self {
        Self {
            id: track.id.unwrap_or_default(),
            name: track.name,
            artist: track
                .artists
                .into_iter()
                .map(|artist| artist.name)
                .collect::<Vec<_>>()
                .join(", "),
            album: track.album.name,
            image: track
                .album
                .images
                .into_iter()
                .next()
                .map(|image| image.url)
                .unwrap_or_default(),
            preview_url: track.preview_url,
            external_url: track.external_urls.get("spotify").cloned().unwrap_or_default(),
            duration_ms: track.duration_ms,
        }
    }
}

/// Client-credential Spotify Web API client. A fresh token is fetched for every lookup.
#[derive(Clone)]
pub struct SpotifyClient {
    http_client: HttpClient,
    client_id: String,
    client_secret: String,
    token_url: String,
    search_url: String,
    market: String,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Result<Self, SpotifyError> {
        let http_client = HttpClient::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http_client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: format!(
                "{}/api/token",
                config.accounts_url.as_str().trim_end_matches('/')
            ),
            search_url: format!("{}/search", config.api_url.as_str().trim_end_matches('/')),
            market: config.market.clone(),
        })
    }

    pub async fn request_access_token(&self) -> Result<String, SpotifyError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(SpotifyError::TokenRejected(response.status()));
        }

        let token_response: SpotifyTokenResponse = response.json().await?;
        log::debug!(
            "Obtained Spotify {} token valid for {}s",
            token_response.token_type,
            token_response.expires_in
        );
        Ok(token_response.access_token)
    }

    pub async fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<TrackRecommendation>, SpotifyError> {
        let limit = limit.to_string();
        let response = self
            .http_client
            .get(&self.search_url)
            .bearer_auth(access_token)
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", limit.as_str()),
                ("market", self.market.as_str()),
            ])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(SpotifyError::SearchRejected(response.status()));
        }

        let search: SearchResponse = response.json().await?;
        Ok(search
            .tracks
            .map(|page| page.items.into_iter().flatten().map(TrackRecommendation::from).collect())
            .unwrap_or_default())
    }

    /// Authenticates, then searches with the keyword query for `emotion`.
    pub async fn recommendations(
        &self,
        emotion: EmotionLabel,
        limit: u32,
    ) -> Result<Vec<TrackRecommendation>, SpotifyError> {
        let access_token = self.request_access_token().await?;
        let query = query_for(emotion);
        log::debug!("Searching Spotify for {} with query '{}'", emotion, query);
        self.search_tracks(&access_token, query, limit).await
    }
}
