/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Load-more control not found: {0}")]
    AdvanceMissing(String),

    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Image decode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<chrome_surface::SurfaceError> for HarvestError {
    fn from(err: chrome_surface::SurfaceError) -> Self {
        HarvestError::Surface(err.to_string())
    }
}

impl From<spotify_client::SpotifyError> for HarvestError {
    fn from(err: spotify_client::SpotifyError) -> Self {
        HarvestError::Lookup(err.to_string())
    }
}

impl From<bing_client::BingError> for HarvestError {
    fn from(err: bing_client::BingError) -> Self {
        HarvestError::Lookup(err.to_string())
    }
}
