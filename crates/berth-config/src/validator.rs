//! Configuration validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::schema::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// First error as a [`ConfigError`], if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidSetting {
                key: error.path,
                reason: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_container(config, &mut result);
        Self::validate_deployment(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_container(config: &Config, result: &mut ValidationResult) {
        let home = config.home();
        if !home.exists() {
            result.add_warning(ValidationWarning::new(
                "container.home",
                format!("Home directory does not exist and will be created: {}", home.display()),
            ));
        }

        for package in &config.container.exported_packages {
            if !is_valid_package(package) {
                result.add_error(ValidationError::new(
                    "container.exported_packages",
                    format!("Invalid package name '{}'", package),
                ));
            }
        }
    }

    fn validate_deployment(config: &Config, result: &mut ValidationResult) {
        let deployment = &config.deployment;

        if deployment.change_check_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "deployment.change_check_interval_ms",
                "change_check_interval_ms must be greater than 0",
            ));
        } else if deployment.change_check_interval_ms < 100 {
            result.add_warning(ValidationWarning::new(
                "deployment.change_check_interval_ms",
                "change_check_interval_ms is very low (<100), scans will run almost continuously",
            ));
        }

        if config.domains_dir() == config.apps_dir() {
            result.add_error(ValidationError::new(
                "deployment.apps_dir",
                "apps_dir and domains_dir must be different directories",
            ));
        }

        if let Some(ref applications) = deployment.applications {
            if applications.is_empty() {
                result.add_warning(ValidationWarning::new(
                    "deployment.applications",
                    "Fixed application set is empty, no application will be deployed",
                ));
            }

            let mut seen = HashSet::new();
            for app in applications {
                if app.trim().is_empty() {
                    result.add_error(ValidationError::new(
                        "deployment.applications",
                        "Application names cannot be empty",
                    ));
                } else if !seen.insert(app.as_str()) {
                    result.add_error(ValidationError::new(
                        "deployment.applications",
                        format!("Application '{}' is listed more than once", app),
                    ));
                }
            }
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let level = config.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', valid values: {:?}",
                    config.logging.level, LOG_LEVELS
                ),
            ));
        }
    }
}

fn is_valid_package(package: &str) -> bool {
    !package.is_empty() && package.split('.').all(|segment| !segment.is_empty())
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
