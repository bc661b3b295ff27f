//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub container: ContainerConfig,

    #[serde(default)]
    pub deployment: DeploymentConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Container home with `~` expanded.
    pub fn home(&self) -> PathBuf {
        expand(&self.container.home)
    }

    /// Directory of container-wide shared libraries.
    pub fn lib_dir(&self) -> PathBuf {
        self.resolve(self.container.lib_dir.as_deref(), "lib")
    }

    /// Directory of container-bundled plugins.
    pub fn plugins_dir(&self) -> PathBuf {
        self.resolve(self.container.plugins_dir.as_deref(), "plugins")
    }

    pub fn domains_dir(&self) -> PathBuf {
        self.resolve(self.deployment.domains_dir.as_deref(), "domains")
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.resolve(self.deployment.apps_dir.as_deref(), "apps")
    }

    fn resolve(&self, configured: Option<&Path>, default_name: &str) -> PathBuf {
        match configured {
            Some(path) => {
                let path = expand(path);
                if path.is_absolute() {
                    path
                } else {
                    self.home().join(path)
                }
            }
            None => self.home().join(default_name),
        }
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(ConfigLoader::expand_path(&path.to_string_lossy()))
}

/// Container configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Root of the host layout.
    #[serde(default = "default_home")]
    pub home: PathBuf,

    /// Overrides `<home>/lib`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib_dir: Option<PathBuf>,

    /// Overrides `<home>/plugins`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins_dir: Option<PathBuf>,

    /// Packages every artifact resolves from the container first.
    #[serde(default)]
    pub exported_packages: Vec<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            lib_dir: None,
            plugins_dir: None,
            exported_packages: Vec::new(),
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".berth")
}

/// Deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Overrides `<home>/domains`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains_dir: Option<PathBuf>,

    /// Overrides `<home>/apps`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps_dir: Option<PathBuf>,

    /// Interval between directory scans.
    #[serde(default = "default_change_check_interval_ms")]
    pub change_check_interval_ms: u64,

    /// Wake the watcher early on filesystem events.
    #[serde(default = "default_watch_events")]
    pub watch_events: bool,

    /// Fixed application set. When present only these applications are
    /// deployed at start and the periodic watcher is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications: Option<Vec<String>>,
}

impl DeploymentConfig {
    pub fn change_check_interval(&self) -> Duration {
        Duration::from_millis(self.change_check_interval_ms)
    }

    pub fn is_fixed_set(&self) -> bool {
        self.applications.is_some()
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            domains_dir: None,
            apps_dir: None,
            change_check_interval_ms: default_change_check_interval_ms(),
            watch_events: default_watch_events(),
            applications: None,
        }
    }
}

fn default_change_check_interval_ms() -> u64 {
    5000
}

fn default_watch_events() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Enables a daily rolling log file in this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Emit JSON lines instead of text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
