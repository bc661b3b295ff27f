//! Descriptor creation errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Artifact location not found: {0}")]
    LocationNotFound(String),

    #[error("Malformed descriptor {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("Invalid plugin {path}: {message}")]
    InvalidPlugin { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
