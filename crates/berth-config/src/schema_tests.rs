use super::*;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert!(config.home().ends_with(".berth"));
    assert!(config.container.exported_packages.is_empty());
    assert_eq!(config.deployment.change_check_interval_ms, 5000);
    assert!(config.deployment.watch_events);
    assert!(!config.deployment.is_fixed_set());
    assert!(!config.logging.json);
}

#[test]
fn test_default_layout_under_home() {
    let mut config = Config::default();
    config.container.home = PathBuf::from("/opt/berth");

    assert_eq!(config.lib_dir(), PathBuf::from("/opt/berth/lib"));
    assert_eq!(config.plugins_dir(), PathBuf::from("/opt/berth/plugins"));
    assert_eq!(config.domains_dir(), PathBuf::from("/opt/berth/domains"));
    assert_eq!(config.apps_dir(), PathBuf::from("/opt/berth/apps"));
}

#[test]
fn test_relative_override_joins_home() {
    let mut config = Config::default();
    config.container.home = PathBuf::from("/opt/berth");
    config.deployment.apps_dir = Some(PathBuf::from("applications"));
    config.deployment.domains_dir = Some(PathBuf::from("/srv/domains"));

    assert_eq!(config.apps_dir(), PathBuf::from("/opt/berth/applications"));
    assert_eq!(config.domains_dir(), PathBuf::from("/srv/domains"));
}

#[test]
fn test_tilde_home_is_expanded() {
    let mut config = Config::default();
    config.container.home = PathBuf::from("~/berth-home");
    let home = config.home();
    assert!(!home.to_string_lossy().starts_with('~'));
    assert!(home.ends_with("berth-home"));
}

#[test]
fn test_change_check_interval() {
    let deployment = DeploymentConfig {
        change_check_interval_ms: 1500,
        ..Default::default()
    };
    assert_eq!(deployment.change_check_interval(), Duration::from_millis(1500));
}

#[test]
fn test_fixed_set() {
    let deployment = DeploymentConfig {
        applications: Some(vec!["orders-app".to_string()]),
        ..Default::default()
    };
    assert!(deployment.is_fixed_set());
}
