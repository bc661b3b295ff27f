//! Errors raised while reading a Berth configuration file.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Berth configuration file {} does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("Cannot read Berth configuration {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration refers to ${{{0}}}, which is not set")]
    UnsetVariable(String),

    #[error("Malformed Berth configuration: {0}")]
    Syntax(#[from] toml::de::Error),

    /// A value the validator rejected, keyed by its dotted path.
    #[error("Setting {key} is invalid: {reason}")]
    InvalidSetting { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_missing_file_names_path() {
        let err = ConfigError::MissingFile(PathBuf::from("/etc/berth/berth.toml"));
        assert_eq!(
            err.to_string(),
            "Berth configuration file /etc/berth/berth.toml does not exist"
        );
    }

    #[test]
    fn test_unreadable_keeps_io_cause() {
        let err = ConfigError::Unreadable {
            path: PathBuf::from("/etc/berth/berth.toml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert!(err.to_string().contains("/etc/berth/berth.toml"));
        let cause = err.source().and_then(|e| e.downcast_ref::<io::Error>()).unwrap();
        assert_eq!(cause.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_unset_variable_shows_placeholder() {
        let err = ConfigError::UnsetVariable("BERTH_HOME".to_string());
        assert_eq!(err.to_string(), "Configuration refers to ${BERTH_HOME}, which is not set");
    }

    #[test]
    fn test_invalid_setting_names_key() {
        let err = ConfigError::InvalidSetting {
            key: "container.exported_packages[0]".to_string(),
            reason: "package prefix must not be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Setting container.exported_packages[0] is invalid: package prefix must not be empty"
        );
    }
}
