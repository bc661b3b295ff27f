//! Artifact loader builder.
//!
//! Builds the unit hierarchy of one artifact:
//!
//! ```text
//! parent (container or domain)
//!   └── {name}/shared        shared libraries
//!         └── {name}/plugins container and artifact plugin views (if any)
//!               └── {name}   the artifact's own code
//! ```

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use berth_protocols::{
    ArtifactDescriptor, ConfigurationError, LoadError, LoadingUnit, LookupOrder,
};

use crate::plugin::{PluginUnit, composite};
use crate::unit::IsolatedUnit;

/// Every unit one artifact owns, plus the unit it resolves through.
pub struct ArtifactUnits {
    unit: Arc<dyn LoadingUnit>,
    owned: Vec<Arc<dyn LoadingUnit>>,
    plugin_units: Vec<PluginUnit>,
    shared_packages: BTreeSet<String>,
}

impl ArtifactUnits {
    /// The artifact-specific unit.
    pub fn unit(&self) -> &Arc<dyn LoadingUnit> {
        &self.unit
    }

    /// Owned units in creation order. Container plugin units are never listed.
    pub fn owned(&self) -> &[Arc<dyn LoadingUnit>] {
        &self.owned
    }

    /// Units of the plugins the artifact itself declares.
    pub fn plugin_units(&self) -> &[PluginUnit] {
        &self.plugin_units
    }

    /// Packages found in shared libraries, resolved parent-first.
    pub fn shared_packages(&self) -> &BTreeSet<String> {
        &self.shared_packages
    }

    /// Dispose every owned unit in reverse creation order.
    ///
    /// Returns how many units this call disposed; a second call returns zero.
    pub fn dispose_all(&self) -> usize {
        dispose_units(&self.owned)
    }
}

fn dispose_units(units: &[Arc<dyn LoadingUnit>]) -> usize {
    let mut disposed = 0;
    for unit in units.iter().rev() {
        if !unit.is_disposed() {
            unit.dispose();
            disposed += 1;
        }
    }
    disposed
}

/// Builder of one artifact's loading hierarchy.
pub struct ArtifactUnitBuilder {
    container_plugins: Vec<PluginUnit>,
    descriptor: Option<ArtifactDescriptor>,
    parent: Option<Arc<dyn LoadingUnit>>,
}

impl ArtifactUnitBuilder {
    pub fn new(container_plugins: Vec<PluginUnit>) -> Self {
        Self {
            container_plugins,
            descriptor: None,
            parent: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: ArtifactDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Container unit, or the owning domain's unit for an application.
    pub fn with_parent(mut self, parent: Arc<dyn LoadingUnit>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Build the hierarchy.
    ///
    /// Configuration is checked before any unit is constructed. If construction
    /// fails part way, the units built so far are disposed.
    pub fn build(self) -> Result<ArtifactUnits, ConfigurationError> {
        let descriptor = self.descriptor.ok_or(ConfigurationError::MissingDescriptor)?;
        let parent = self
            .parent
            .ok_or_else(|| ConfigurationError::MissingParent(descriptor.name.clone()))?;
        validate_plugins(&descriptor, &self.container_plugins)?;

        let mut owned: Vec<Arc<dyn LoadingUnit>> = Vec::new();
        let result = build_units(&descriptor, parent, &self.container_plugins, &mut owned);
        match result {
            Ok((unit, plugin_units, shared_packages)) => {
                debug!(
                    artifact = %descriptor.name,
                    units = owned.len(),
                    plugins = plugin_units.len(),
                    "Built loading hierarchy"
                );
                Ok(ArtifactUnits {
                    unit,
                    owned,
                    plugin_units,
                    shared_packages,
                })
            }
            Err(source) => {
                let disposed = dispose_units(&owned);
                warn!(
                    "Failed to build loading hierarchy for {}, disposed {} partial units: {}",
                    descriptor.name, disposed, source
                );
                Err(ConfigurationError::InvalidSource {
                    artifact: descriptor.name,
                    source,
                })
            }
        }
    }
}

/// Check the effective plugin set: no collision with a container plugin, no repeats.
fn validate_plugins(
    descriptor: &ArtifactDescriptor,
    container_plugins: &[PluginUnit],
) -> Result<(), ConfigurationError> {
    let container: HashSet<&str> = container_plugins.iter().map(PluginUnit::name).collect();
    let mut declared = HashSet::new();

    for plugin in &descriptor.plugins {
        if container.contains(plugin.name.as_str()) {
            return Err(ConfigurationError::PluginCollision {
                artifact: descriptor.name.clone(),
                plugin: plugin.name.clone(),
            });
        }
        if !declared.insert(plugin.name.as_str()) {
            return Err(ConfigurationError::DuplicatePlugin {
                artifact: descriptor.name.clone(),
                plugin: plugin.name.clone(),
            });
        }
    }
    Ok(())
}

type Built = (Arc<dyn LoadingUnit>, Vec<PluginUnit>, BTreeSet<String>);

fn build_units(
    descriptor: &ArtifactDescriptor,
    parent: Arc<dyn LoadingUnit>,
    container_plugins: &[PluginUnit],
    owned: &mut Vec<Arc<dyn LoadingUnit>>,
) -> Result<Built, LoadError> {
    let name = &descriptor.name;

    let shared = IsolatedUnit::open(
        format!("{name}/shared"),
        &descriptor.shared_libraries,
        Some(parent.clone()),
        parent.policy().clone(),
    )?;
    let shared_packages = shared.packages();
    let shared: Arc<dyn LoadingUnit> = Arc::new(shared);
    owned.push(shared.clone());
    let shared_packages = shared_packages?;

    let mut plugin_units = Vec::with_capacity(descriptor.plugins.len());
    let mut next_parent = shared.clone();

    if !container_plugins.is_empty() || !descriptor.plugins.is_empty() {
        for plugin in &descriptor.plugins {
            let unit = PluginUnit::open(plugin.clone(), name, shared.clone())?;
            owned.push(unit.unit().clone());
            plugin_units.push(unit);
        }

        let effective: Vec<PluginUnit> = container_plugins
            .iter()
            .chain(plugin_units.iter())
            .cloned()
            .collect();
        let plugins: Arc<dyn LoadingUnit> =
            Arc::new(composite(format!("{name}/plugins"), shared.clone(), &effective));
        owned.push(plugins.clone());
        next_parent = plugins;
    }

    let policy = parent
        .policy()
        .extend_packages(shared_packages.iter().cloned(), LookupOrder::ParentFirst)
        .extend_packages(descriptor.parent_first_packages.iter().cloned(), LookupOrder::ParentFirst);
    let unit: Arc<dyn LoadingUnit> = Arc::new(IsolatedUnit::open(
        name.clone(),
        &descriptor.code_paths,
        Some(next_parent),
        policy,
    )?);
    owned.push(unit.clone());

    Ok((unit, plugin_units, shared_packages))
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
