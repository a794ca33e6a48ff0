use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpotifyError>;

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SpotifyError {
    fn from(err: reqwest::Error) -> Self {
        SpotifyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SpotifyError {
    fn from(err: serde_json::Error) -> Self {
        SpotifyError::Parse(err.to_string())
    }
}
