//! Loading hierarchy configuration errors.
//!
//! These are fatal to one build attempt and never retried automatically.

use thiserror::Error;

use super::LoadError;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Artifact descriptor is missing")]
    MissingDescriptor,

    #[error("Parent loading unit is missing for artifact {0}")]
    MissingParent(String),

    #[error("Domain {domain} required by artifact {artifact} is not deployed")]
    MissingDomain { artifact: String, domain: String },

    #[error("Plugin {plugin} declared by artifact {artifact} collides with a container plugin")]
    PluginCollision { artifact: String, plugin: String },

    #[error("Plugin {plugin} is declared more than once by artifact {artifact}")]
    DuplicatePlugin { artifact: String, plugin: String },

    #[error("Invalid source for artifact {artifact}: {source}")]
    InvalidSource {
        artifact: String,
        #[source]
        source: LoadError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_collision_error() {
        let err = ConfigurationError::PluginCollision {
            artifact: "orders-app".to_string(),
            plugin: "http-connector".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("orders-app"));
        assert!(display.contains("http-connector"));
        assert!(display.contains("collides"));
    }

    #[test]
    fn test_missing_domain_error() {
        let err = ConfigurationError::MissingDomain {
            artifact: "orders-app".to_string(),
            domain: "shared-domain".to_string(),
        };
        assert!(err.to_string().contains("shared-domain"));
    }

    #[test]
    fn test_invalid_source_keeps_cause() {
        use std::error::Error;

        let err = ConfigurationError::InvalidSource {
            artifact: "a".to_string(),
            source: LoadError::NotFound("lib/x.tar.gz".to_string()),
        };
        assert!(err.source().is_some());
    }
}
