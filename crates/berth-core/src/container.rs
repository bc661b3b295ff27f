//! Container bootstrap.
//!
//! The container unit is the root of every hierarchy. It holds the libraries
//! under `<home>/lib` and, below it, one unit per plugin under
//! `<home>/plugins`. Both are shared by every artifact and released only at
//! process shutdown.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use berth_config::Config;
use berth_loader::{IsolatedUnit, PluginUnit};
use berth_protocols::{DescriptorLoader, LoadingUnit, LookupOrder, LookupPolicy};

use crate::descriptor::list_sources;
use crate::error::{ContainerError, ShutdownError};
use crate::shutdown;

pub const CONTAINER_UNIT: &str = "container";

pub struct Container {
    unit: Arc<dyn LoadingUnit>,
    plugins: Vec<PluginUnit>,
}

impl Container {
    /// Open the container unit and its plugins from the configured directories.
    pub fn bootstrap(config: &Config, loader: &dyn DescriptorLoader) -> Result<Self, ContainerError> {
        let libs = list_sources(&config.lib_dir())?;
        let policy = LookupPolicy::with_packages(
            config.container.exported_packages.iter().cloned(),
            LookupOrder::ParentFirst,
        );
        let unit: Arc<dyn LoadingUnit> =
            Arc::new(IsolatedUnit::open(CONTAINER_UNIT, &libs, None, policy)?);

        let container = Self {
            unit,
            plugins: Vec::new(),
        };
        match container.open_plugins(config, loader) {
            Ok(plugins) => {
                let container = Self { plugins, ..container };
                info!(
                    "Container bootstrapped with {} libraries and {} plugins",
                    libs.len(),
                    container.plugins.len()
                );
                Ok(container)
            }
            Err(e) => {
                container.dispose();
                Err(e)
            }
        }
    }

    fn open_plugins(
        &self,
        config: &Config,
        loader: &dyn DescriptorLoader,
    ) -> Result<Vec<PluginUnit>, ContainerError> {
        let mut plugins = Vec::new();
        match self.collect_plugins(config, loader, &mut plugins) {
            Ok(()) => Ok(plugins),
            Err(e) => {
                for plugin in plugins.iter().rev() {
                    plugin.unit().dispose();
                }
                Err(e)
            }
        }
    }

    fn collect_plugins(
        &self,
        config: &Config,
        loader: &dyn DescriptorLoader,
        plugins: &mut Vec<PluginUnit>,
    ) -> Result<(), ContainerError> {
        let mut names = HashSet::new();
        for location in list_sources(&config.plugins_dir())? {
            let descriptor = loader.load_plugin(&location)?;
            if !names.insert(descriptor.name.clone()) {
                return Err(ContainerError::DuplicatePlugin(descriptor.name));
            }
            debug!("Opening container plugin {}", descriptor.name);
            plugins.push(PluginUnit::open(descriptor, CONTAINER_UNIT, self.unit.clone())?);
        }
        Ok(())
    }

    /// Assemble a container from already opened parts.
    pub fn from_parts(unit: Arc<dyn LoadingUnit>, plugins: Vec<PluginUnit>) -> Self {
        Self { unit, plugins }
    }

    pub fn unit(&self) -> &Arc<dyn LoadingUnit> {
        &self.unit
    }

    pub fn plugins(&self) -> &[PluginUnit] {
        &self.plugins
    }

    /// Dispose plugin units, then the container unit.
    pub fn dispose(&self) {
        for plugin in self.plugins.iter().rev() {
            plugin.unit().dispose();
        }
        self.unit.dispose();
        debug!("Container disposed");
    }

    /// Dispose the container when the process shutdown hooks run.
    pub fn register_shutdown_hook(&self) -> Result<(), ShutdownError> {
        let container = Self::from_parts(self.unit.clone(), self.plugins.clone());
        shutdown::register(CONTAINER_UNIT, move || async move {
            container.dispose();
        })
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
