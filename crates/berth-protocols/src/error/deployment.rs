//! Deployment failures surfaced to callers and the directory watcher.

use thiserror::Error;

use super::{ArtifactError, BoxError, ConfigurationError, DescriptorError};

/// The single failure type of the deployment pipeline.
///
/// Internal causes are wrapped with [`DeploymentError::wrap`], which keeps an
/// existing `DeploymentError` unchanged so its classification is never lost.
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("Failed to deploy artifact {artifact}: {source}")]
    Failed {
        artifact: String,
        #[source]
        source: BoxError,
    },

    #[error("Configuration error in artifact {artifact}: {source}")]
    Configuration {
        artifact: String,
        #[source]
        source: ConfigurationError,
    },

    #[error("Cannot create descriptor for artifact {artifact}: {source}")]
    Descriptor {
        artifact: String,
        #[source]
        source: DescriptorError,
    },

    #[error("Failed to install artifact {artifact}: {source}")]
    Install {
        artifact: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact {artifact} cannot go from {from} to {to}")]
    InvalidTransition {
        artifact: String,
        from: String,
        to: String,
    },

    #[error("Failed to undeploy artifact {artifact}: {message}")]
    UndeployFailed { artifact: String, message: String },

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Deployment service is stopped")]
    ServiceStopped,
}

impl DeploymentError {
    /// Wrap an internal error, passing deployment errors through untouched.
    ///
    /// A deployment error boxed inside [`ArtifactError::Other`] counts as
    /// one too.
    pub fn wrap(artifact: impl Into<String>, error: impl Into<BoxError>) -> Self {
        let error = match error.into().downcast::<ArtifactError>() {
            Ok(artifact_error) => match *artifact_error {
                ArtifactError::Other(inner) => inner,
                other => Box::new(other),
            },
            Err(error) => error,
        };
        match error.downcast::<DeploymentError>() {
            Ok(deployment) => *deployment,
            Err(other) => DeploymentError::Failed {
                artifact: artifact.into(),
                source: other,
            },
        }
    }

    /// Shorthand for a configuration failure.
    pub fn configuration(artifact: impl Into<String>, source: ConfigurationError) -> Self {
        DeploymentError::Configuration {
            artifact: artifact.into(),
            source,
        }
    }

    /// Name of the artifact the failure belongs to, when known.
    pub fn artifact(&self) -> Option<&str> {
        match self {
            DeploymentError::Failed { artifact, .. }
            | DeploymentError::Configuration { artifact, .. }
            | DeploymentError::Descriptor { artifact, .. }
            | DeploymentError::Install { artifact, .. }
            | DeploymentError::InvalidTransition { artifact, .. }
            | DeploymentError::UndeployFailed { artifact, .. } => Some(artifact),
            DeploymentError::NotFound(name) => Some(name),
            DeploymentError::ServiceStopped => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, DeploymentError::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_wrap_foreign_error() {
        let err = DeploymentError::wrap("orders-app", ArtifactError::StartFailed("boom".into()));
        match &err {
            DeploymentError::Failed { artifact, source } => {
                assert_eq!(artifact, "orders-app");
                assert!(source.to_string().contains("boom"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(err.source().is_some());
    }

    #[test]
    fn test_wrap_keeps_deployment_error() {
        let original = DeploymentError::configuration(
            "orders-app",
            ConfigurationError::PluginCollision {
                artifact: "orders-app".into(),
                plugin: "http-connector".into(),
            },
        );
        let err = DeploymentError::wrap("other-name", original);
        assert!(err.is_configuration());
        assert_eq!(err.artifact(), Some("orders-app"));
    }

    #[test]
    fn test_wrap_unwraps_artifact_other() {
        let inner = DeploymentError::NotFound("shared-domain".into());
        let err = DeploymentError::wrap("orders-app", ArtifactError::Other(Box::new(inner)));
        assert!(matches!(err, DeploymentError::NotFound(name) if name == "shared-domain"));

        let io = std::io::Error::other("disk gone");
        let err = DeploymentError::wrap("orders-app", ArtifactError::Other(Box::new(io)));
        match err {
            DeploymentError::Failed { artifact, source } => {
                assert_eq!(artifact, "orders-app");
                assert!(source.downcast_ref::<std::io::Error>().is_some());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_wrap_does_not_double_wrap() {
        let first = DeploymentError::wrap("a", ArtifactError::Custom("root".into()));
        let second = DeploymentError::wrap("a", first);
        match second {
            DeploymentError::Failed { source, .. } => {
                assert!(source.downcast_ref::<ArtifactError>().is_some());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_not_found_artifact_name() {
        let err = DeploymentError::NotFound("ghost".into());
        assert_eq!(err.artifact(), Some("ghost"));
        assert!(DeploymentError::ServiceStopped.artifact().is_none());
    }
}
