//! Loading unit errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Loading unit disposed: {0}")]
    Disposed(String),

    #[error("Byte source closed: {0}")]
    SourceClosed(String),

    #[error("Invalid resource name: {0}")]
    InvalidName(String),

    #[error("Failed to open byte source {location}: {message}")]
    OpenFailed { location: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// Whether this error only means the lookup missed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound(_))
    }
}
