use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::SourceUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::SourceUnavailable(err.to_string())
    }
}
