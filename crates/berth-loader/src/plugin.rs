//! Plugin views and the plugin composite.
//!
//! A plugin view exposes only what its plugin exports. The composite tries its
//! parent first, then every view in declaration order, and returns the first hit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use berth_protocols::loading::CLASS_SUFFIX;
use berth_protocols::{LoadError, LoadingUnit, LookupPolicy, PluginDescriptor, Resource, package_of};

use crate::unit::IsolatedUnit;

/// A plugin's descriptor and the unit holding its bytes.
#[derive(Clone)]
pub struct PluginUnit {
    descriptor: PluginDescriptor,
    unit: Arc<dyn LoadingUnit>,
}

impl PluginUnit {
    pub fn new(descriptor: PluginDescriptor, unit: Arc<dyn LoadingUnit>) -> Self {
        Self { descriptor, unit }
    }

    /// Open the plugin's location as a unit named `{owner}/plugin/{name}` below `parent`.
    pub fn open(
        descriptor: PluginDescriptor,
        owner: &str,
        parent: Arc<dyn LoadingUnit>,
    ) -> Result<Self, LoadError> {
        let name = format!("{}/plugin/{}", owner, descriptor.name);
        let policy = parent.policy().clone();
        let unit = IsolatedUnit::open(
            name,
            std::slice::from_ref(&descriptor.location),
            Some(parent),
            policy,
        )?;
        Ok(Self::new(descriptor, Arc::new(unit)))
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn unit(&self) -> &Arc<dyn LoadingUnit> {
        &self.unit
    }
}

impl std::fmt::Debug for PluginUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginUnit")
            .field("name", &self.descriptor.name)
            .field("unit", &self.unit.name())
            .finish()
    }
}

/// Export-filtered view over a plugin unit.
pub struct PluginView {
    name: String,
    exported_packages: Vec<String>,
    exported_resources: Vec<String>,
    unit: Arc<dyn LoadingUnit>,
    policy: LookupPolicy,
    disposed: AtomicBool,
}

impl PluginView {
    /// Whether classes of `package` are visible.
    pub fn exports_package(&self, package: &str) -> bool {
        self.exported_packages.iter().any(|p| p == package)
    }

    /// Whether a non-class resource is visible.
    ///
    /// Entries ending in `/` export everything below that directory.
    pub fn exports_resource(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.exported_resources.iter().any(|exported| {
            let exported = exported.trim_start_matches('/');
            if exported.ends_with('/') {
                path.starts_with(exported)
            } else {
                path == exported
            }
        })
    }

    fn is_visible(&self, path: &str) -> bool {
        if path.ends_with(CLASS_SUFFIX) {
            self.exports_package(&package_of(path))
        } else {
            self.exports_resource(path)
        }
    }
}

impl LoadingUnit for PluginView {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> &LookupPolicy {
        &self.policy
    }

    fn parent(&self) -> Option<&Arc<dyn LoadingUnit>> {
        Some(&self.unit)
    }

    fn load_resource(&self, path: &str) -> Result<Resource, LoadError> {
        if self.is_disposed() {
            return Err(LoadError::Disposed(self.name.clone()));
        }
        if !self.is_visible(path) {
            return Err(LoadError::NotFound(path.to_string()));
        }
        self.unit.load_resource(path)
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Build the filtered view of one plugin.
pub fn build_plugin_view(plugin: &PluginUnit) -> PluginView {
    PluginView {
        name: format!("{}/view", plugin.unit.name()),
        exported_packages: plugin.descriptor.exported_packages.clone(),
        exported_resources: plugin.descriptor.exported_resources.clone(),
        unit: plugin.unit.clone(),
        policy: LookupPolicy::new(),
        disposed: AtomicBool::new(false),
    }
}

/// Parent plus plugin views under one resolution facade.
pub struct CompositeUnit {
    name: String,
    parent: Arc<dyn LoadingUnit>,
    views: Vec<PluginView>,
    policy: LookupPolicy,
    disposed: AtomicBool,
}

impl CompositeUnit {
    /// Names of the composed plugins, in lookup order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.views.iter().map(|v| v.unit.name()).collect()
    }
}

impl LoadingUnit for CompositeUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> &LookupPolicy {
        &self.policy
    }

    fn parent(&self) -> Option<&Arc<dyn LoadingUnit>> {
        Some(&self.parent)
    }

    fn load_resource(&self, path: &str) -> Result<Resource, LoadError> {
        if self.is_disposed() {
            return Err(LoadError::Disposed(self.name.clone()));
        }

        if let Some(resource) = first_hit(self.parent.load_resource(path))? {
            return Ok(resource);
        }
        for view in &self.views {
            if let Some(resource) = first_hit(view.load_resource(path))? {
                return Ok(resource);
            }
        }
        Err(LoadError::NotFound(path.to_string()))
    }

    /// Marks the composite and its views disposed; parent and plugins stay untouched.
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for view in &self.views {
            view.dispose();
        }
        debug!("Disposed plugin composite {}", self.name);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

fn first_hit(result: Result<Resource, LoadError>) -> Result<Option<Resource>, LoadError> {
    match result {
        Ok(resource) => Ok(Some(resource)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Compose `parent` with a view of every plugin, in the given order.
pub fn composite(
    name: impl Into<String>,
    parent: Arc<dyn LoadingUnit>,
    plugins: &[PluginUnit],
) -> CompositeUnit {
    let policy = parent.policy().clone();
    CompositeUnit {
        name: name.into(),
        parent,
        views: plugins.iter().map(build_plugin_view).collect(),
        policy,
        disposed: AtomicBool::new(false),
    }
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
