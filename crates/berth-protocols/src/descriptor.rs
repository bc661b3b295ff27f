//! Artifact and plugin descriptors.
//!
//! Descriptors are produced by a [`DescriptorLoader`](crate::DescriptorLoader) and are
//! immutable for the lifetime of one deployment attempt.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kind of a deployable or shareable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Domain,
    Application,
    Plugin,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Domain => write!(f, "domain"),
            ArtifactKind::Application => write!(f, "application"),
            ArtifactKind::Plugin => write!(f, "plugin"),
        }
    }
}

/// Declared plugin: its name, the exports visible to others, and its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    #[serde(default)]
    pub exported_packages: Vec<String>,
    #[serde(default)]
    pub exported_resources: Vec<String>,
    #[serde(default)]
    pub location: PathBuf,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            exported_packages: Vec::new(),
            exported_resources: Vec::new(),
            location: location.into(),
        }
    }

    pub fn with_exported_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exported_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exported_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exported_resources = resources.into_iter().map(Into::into).collect();
        self
    }
}

/// Declarative manifest of a domain or application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub kind: ArtifactKind,
    /// Exploded artifact directory.
    pub location: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_file: Option<PathBuf>,
    /// Parent domain; only meaningful for applications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Bundled plugins in declaration order.
    #[serde(default)]
    pub plugins: Vec<PluginDescriptor>,
    #[serde(default)]
    pub shared_libraries: Vec<PathBuf>,
    /// The artifact's own code and resources.
    #[serde(default)]
    pub code_paths: Vec<PathBuf>,
    #[serde(default)]
    pub config_resources: Vec<String>,
    #[serde(default)]
    pub parent_first_packages: Vec<String>,
    #[serde(default = "default_redeployment_enabled")]
    pub redeployment_enabled: bool,
}

fn default_redeployment_enabled() -> bool {
    true
}

impl ArtifactDescriptor {
    pub fn new(name: impl Into<String>, kind: ArtifactKind, location: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            location: location.into(),
            descriptor_file: None,
            domain: None,
            plugins: Vec::new(),
            shared_libraries: Vec::new(),
            code_paths: Vec::new(),
            config_resources: Vec::new(),
            parent_first_packages: Vec::new(),
            redeployment_enabled: true,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_plugin(mut self, plugin: PluginDescriptor) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_shared_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.shared_libraries.push(path.into());
        self
    }

    pub fn with_code_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.code_paths.push(path.into());
        self
    }

    pub fn with_config_resource(mut self, resource: impl Into<String>) -> Self {
        self.config_resources.push(resource.into());
        self
    }

    pub fn is_domain(&self) -> bool {
        self.kind == ArtifactKind::Domain
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
