//! Errors raised by artifact runtimes and factories.

use thiserror::Error;

use super::{BoxError, LoadError};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Artifact start failed: {0}")]
    StartFailed(String),

    #[error("Artifact stop failed: {0}")]
    StopFailed(String),

    #[error("Artifact dispose failed: {0}")]
    DisposeFailed(String),

    #[error("Resource error: {0}")]
    Resource(#[from] LoadError),

    #[error("{0}")]
    Custom(String),

    #[error(transparent)]
    Other(BoxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_failed_error() {
        let err = ArtifactError::StartFailed("port in use".to_string());
        assert!(err.to_string().contains("start failed"));
        assert!(err.to_string().contains("port in use"));
    }

    #[test]
    fn test_resource_error_from() {
        let err = ArtifactError::from(LoadError::NotFound("app.xml".to_string()));
        assert!(err.to_string().contains("app.xml"));
    }

    #[test]
    fn test_custom_error() {
        let err = ArtifactError::Custom("custom".to_string());
        assert_eq!(err.to_string(), "custom");
    }
}
