use super::*;
use std::path::PathBuf;

fn config_in(home: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.container.home = home.to_path_buf();
    config
}

#[test]
fn test_validate_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let result = ConfigValidator::validate(&config_in(dir.path()));
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_missing_home_is_a_warning() {
    let config = config_in(&PathBuf::from("/nonexistent/berth/home"));
    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "container.home"));
}

#[test]
fn test_zero_interval_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.deployment.change_check_interval_ms = 0;

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert_eq!(result.errors[0].path, "deployment.change_check_interval_ms");
}

#[test]
fn test_low_interval_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.deployment.change_check_interval_ms = 10;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_invalid_exported_package() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.container.exported_packages = vec!["org.slf4j".into(), "com..acme".into(), "".into()];

    let result = ConfigValidator::validate(&config);
    assert_eq!(result.errors.len(), 2);
}

#[test]
fn test_same_apps_and_domains_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.deployment.apps_dir = Some(PathBuf::from("artifacts"));
    config.deployment.domains_dir = Some(PathBuf::from("artifacts"));

    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "deployment.apps_dir"));
}

#[test]
fn test_duplicate_fixed_applications() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.deployment.applications = Some(vec!["orders-app".into(), "orders-app".into()]);

    let result = ConfigValidator::validate(&config);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].message.contains("orders-app"));
}

#[test]
fn test_empty_fixed_set_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.deployment.applications = Some(Vec::new());

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "deployment.applications"));
}

#[test]
fn test_unknown_log_level() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.logging.level = "verbose".into();

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "logging.level"));
}

#[test]
fn test_into_result_reports_first_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.deployment.change_check_interval_ms = 0;

    let err = ConfigValidator::validate(&config).into_result().unwrap_err();
    assert!(matches!(&err, ConfigError::InvalidSetting { key, .. } if key == "deployment.change_check_interval_ms"));
    assert!(err.to_string().contains("change_check_interval_ms"));
}
