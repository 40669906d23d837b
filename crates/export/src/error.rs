use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid row at line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },
}

/// Failure to deliver one import request. Recorded, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Failed to open URL: {0}")]
    Open(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Request rejected with status {0}")]
    Status(u16),
}
