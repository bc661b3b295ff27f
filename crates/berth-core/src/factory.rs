//! Default artifact factory.
//!
//! The runtime it builds has no behavior of its own: init checks that every
//! configuration resource named by the descriptor resolves through the
//! artifact's unit, and start/stop only log.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use berth_protocols::{
    ArtifactDescriptor, ArtifactError, ArtifactFactory, ArtifactKind, ArtifactRuntime, LoadingUnit,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestArtifactFactory;

impl ManifestArtifactFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactFactory for ManifestArtifactFactory {
    async fn create(
        &self,
        unit: Arc<dyn LoadingUnit>,
        descriptor: &ArtifactDescriptor,
    ) -> Result<Box<dyn ArtifactRuntime>, ArtifactError> {
        Ok(Box::new(ManifestArtifact {
            name: descriptor.name.clone(),
            kind: descriptor.kind,
            config_resources: descriptor.config_resources.clone(),
            unit,
            loaded: 0,
        }))
    }
}

pub struct ManifestArtifact {
    name: String,
    kind: ArtifactKind,
    config_resources: Vec<String>,
    unit: Arc<dyn LoadingUnit>,
    loaded: usize,
}

impl ManifestArtifact {
    /// Number of configuration resources resolved at init.
    pub fn loaded_resources(&self) -> usize {
        self.loaded
    }
}

#[async_trait]
impl ArtifactRuntime for ManifestArtifact {
    async fn init(&mut self) -> Result<(), ArtifactError> {
        for resource in &self.config_resources {
            let found = self.unit.load_resource(resource)?;
            debug!(
                artifact = %self.name,
                resource = %resource,
                unit = %found.unit,
                bytes = found.len(),
                "Resolved configuration resource"
            );
        }
        self.loaded = self.config_resources.len();
        Ok(())
    }

    async fn start(&mut self) -> Result<(), ArtifactError> {
        info!("{} {} running with {} configuration resources", self.kind, self.name, self.loaded);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ArtifactError> {
        debug!("{} {} stopping", self.kind, self.name);
        Ok(())
    }
}
