use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurfaceError>;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Script returned no value for: {0}")]
    EmptyScriptResult(String),
}

impl From<chromiumoxide::error::CdpError> for SurfaceError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        SurfaceError::Protocol(err.to_string())
    }
}
