//! Manifest-based descriptor loader.
//!
//! Artifact layout:
//!
//! ```text
//! <artifact>/
//!   artifact.toml      optional manifest
//!   classes/           the artifact's own code and resources
//!   lib/               shared libraries, archives or directories
//!   plugins/           bundled plugins, archives or directories with plugin.toml
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use berth_loader::archive::{archive_name, is_archive};
use berth_loader::{ArchiveSource, ByteSource};
use berth_protocols::{
    ArtifactDescriptor, ArtifactKind, DescriptorError, DescriptorLoader, PluginDescriptor,
};

pub const ARTIFACT_MANIFEST: &str = "artifact.toml";
pub const PLUGIN_MANIFEST: &str = "plugin.toml";
pub const CLASSES_DIR: &str = "classes";
pub const LIB_DIR: &str = "lib";
pub const PLUGINS_DIR: &str = "plugins";

#[derive(Debug, Default, Deserialize)]
struct ArtifactManifest {
    name: Option<String>,
    domain: Option<String>,
    redeployment_enabled: Option<bool>,
    #[serde(default)]
    config_resources: Vec<String>,
    #[serde(default)]
    parent_first_packages: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PluginManifest {
    name: Option<String>,
    #[serde(default)]
    exported_packages: Vec<String>,
    #[serde(default)]
    exported_resources: Vec<String>,
}

/// Reads `artifact.toml` and `plugin.toml` manifests.
#[derive(Debug, Default, Clone)]
pub struct ManifestDescriptorLoader;

impl ManifestDescriptorLoader {
    pub fn new() -> Self {
        Self
    }

    fn read_manifest(&self, path: &Path) -> Result<ArtifactManifest, DescriptorError> {
        if !path.is_file() {
            return Ok(ArtifactManifest::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| DescriptorError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn read_plugin_manifest(&self, location: &Path) -> Result<Option<PluginManifest>, DescriptorError> {
        let invalid = |message: String| DescriptorError::InvalidPlugin {
            path: location.display().to_string(),
            message,
        };

        let content = if location.is_dir() {
            let path = location.join(PLUGIN_MANIFEST);
            if !path.is_file() {
                return Ok(None);
            }
            fs::read(&path)?
        } else if is_archive(location) {
            let source = ArchiveSource::open(location).map_err(|e| invalid(e.to_string()))?;
            let bytes = source
                .read(PLUGIN_MANIFEST)
                .map_err(|e| invalid(e.to_string()))?;
            source.close();
            match bytes {
                Some(bytes) => bytes.to_vec(),
                None => return Ok(None),
            }
        } else {
            return Err(invalid("not a directory or archive".to_string()));
        };

        let text = String::from_utf8(content).map_err(|e| invalid(e.to_string()))?;
        toml::from_str(&text)
            .map(Some)
            .map_err(|e| invalid(e.to_string()))
    }
}

impl DescriptorLoader for ManifestDescriptorLoader {
    fn load(&self, location: &Path, kind: ArtifactKind) -> Result<ArtifactDescriptor, DescriptorError> {
        if !location.is_dir() {
            return Err(DescriptorError::LocationNotFound(location.display().to_string()));
        }

        let manifest_path = location.join(ARTIFACT_MANIFEST);
        let manifest = self.read_manifest(&manifest_path)?;
        let name = match manifest.name {
            Some(name) => name,
            None => dir_name(location)?,
        };

        let mut descriptor = ArtifactDescriptor::new(name, kind, location);
        if manifest_path.is_file() {
            descriptor.descriptor_file = Some(manifest_path);
        }

        match (kind, manifest.domain) {
            (ArtifactKind::Application, domain) => descriptor.domain = domain,
            (_, Some(domain)) => {
                warn!("Ignoring domain '{}' declared by {} {}", domain, kind, descriptor.name)
            }
            (_, None) => {}
        }

        let classes = location.join(CLASSES_DIR);
        if classes.is_dir() {
            descriptor.code_paths.push(classes);
        }
        descriptor.shared_libraries = list_sources(&location.join(LIB_DIR))?;
        for plugin in list_sources(&location.join(PLUGINS_DIR))? {
            descriptor.plugins.push(self.load_plugin(&plugin)?);
        }

        descriptor.config_resources = manifest.config_resources;
        descriptor.parent_first_packages = manifest.parent_first_packages;
        if let Some(enabled) = manifest.redeployment_enabled {
            descriptor.redeployment_enabled = enabled;
        }

        debug!(
            artifact = %descriptor.name,
            kind = %kind,
            plugins = descriptor.plugins.len(),
            libs = descriptor.shared_libraries.len(),
            "Loaded descriptor"
        );
        Ok(descriptor)
    }

    fn load_plugin(&self, location: &Path) -> Result<PluginDescriptor, DescriptorError> {
        let manifest = self.read_plugin_manifest(location)?.unwrap_or_default();
        let name = match manifest.name {
            Some(name) => name,
            None => archive_name(location)
                .or_else(|| location.file_name().and_then(|n| n.to_str()).map(str::to_string))
                .ok_or_else(|| DescriptorError::InvalidPlugin {
                    path: location.display().to_string(),
                    message: "cannot derive plugin name".to_string(),
                })?,
        };

        Ok(PluginDescriptor {
            name,
            exported_packages: manifest.exported_packages,
            exported_resources: manifest.exported_resources,
            location: location.to_path_buf(),
        })
    }
}

fn dir_name(location: &Path) -> Result<String, DescriptorError> {
    location
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| DescriptorError::LocationNotFound(location.display().to_string()))
}

/// Archives and directories directly under `dir`, sorted by file name.
///
/// A missing directory has no sources.
pub fn list_sources(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut sources: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| !is_hidden(path))
        .filter(|path| path.is_dir() || is_archive(path))
        .collect();
    sources.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(sources)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
