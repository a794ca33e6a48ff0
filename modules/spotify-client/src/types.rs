use serde::{Deserialize, Serialize};

/// Client-credentials token response from the accounts service.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub tracks: Option<TrackPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackPage {
    #[serde(default)]
    pub items: Vec<Track>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
}

/// Audio features for a single track. The endpoint returns more fields
/// (tempo, key, loudness, ...); only the perceptual ones are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub acousticness: f64,
    pub danceability: f64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub speechiness: f64,
    pub valence: f64,
}
