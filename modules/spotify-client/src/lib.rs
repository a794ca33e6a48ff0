pub mod error;
pub mod types;

pub use error::{Result, SpotifyError};
pub use types::{AudioFeatures, SearchResponse, TokenResponse, Track, TrackPage};

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Refresh the token this long before the accounts service says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct SpotifyClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
            client_secret,
            token: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, requesting a new one when the cached
    /// token is missing or about to expire.
    async fn bearer(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        tracing::debug!("Requesting client-credentials token");
        let resp = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SpotifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let token: TokenResponse = resp.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *guard = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let token = self.bearer().await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SpotifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Search for a track by title and artist. Returns the ID of the best
    /// match, or `None` when the catalogue has nothing.
    pub async fn find_track_id(&self, title: &str, artist: &str) -> Result<Option<String>> {
        let query = track_query(title, artist);
        let url = format!("{API_BASE_URL}/search");
        let resp: SearchResponse = self
            .get_json(&url, &[("q", query.as_str()), ("type", "track"), ("limit", "1")])
            .await?;

        let id = resp
            .tracks
            .and_then(|page| page.items.into_iter().next())
            .map(|track| track.id);
        tracing::debug!(title, artist, found = id.is_some(), "Track search finished");
        Ok(id)
    }

    /// Fetch audio features for a track ID.
    pub async fn audio_features(&self, track_id: &str) -> Result<AudioFeatures> {
        let url = format!("{API_BASE_URL}/audio-features/{track_id}");
        self.get_json(&url, &[]).await
    }
}

/// Field-filtered search query understood by the search endpoint.
pub fn track_query(title: &str, artist: &str) -> String {
    format!("track:{title} artist:{artist}")
}
