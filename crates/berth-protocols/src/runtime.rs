//! Collaborator traits consumed by the deployment engine.
//!
//! The engine never inspects what a factory builds; it only drives the
//! returned runtime through its lifecycle hooks.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::descriptor::{ArtifactDescriptor, ArtifactKind, PluginDescriptor};
use crate::error::{ArtifactError, DescriptorError};
use crate::loading::LoadingUnit;

/// A runnable artifact bound to its loading unit.
#[async_trait]
pub trait ArtifactRuntime: Send + Sync {
    /// Wire descriptor-declared dependencies.
    async fn init(&mut self) -> Result<(), ArtifactError>;

    async fn start(&mut self) -> Result<(), ArtifactError>;

    async fn stop(&mut self) -> Result<(), ArtifactError>;

    /// Release runtime resources. Loading units are released by the caller.
    async fn dispose(&mut self) -> Result<(), ArtifactError> {
        Ok(())
    }
}

/// Produces runnable artifacts.
#[async_trait]
pub trait ArtifactFactory: Send + Sync {
    async fn create(
        &self,
        unit: Arc<dyn LoadingUnit>,
        descriptor: &ArtifactDescriptor,
    ) -> Result<Box<dyn ArtifactRuntime>, ArtifactError>;
}

/// Produces descriptors from artifact locations.
pub trait DescriptorLoader: Send + Sync {
    /// Load the descriptor of an exploded domain or application.
    fn load(&self, location: &Path, kind: ArtifactKind) -> Result<ArtifactDescriptor, DescriptorError>;

    /// Load the descriptor of a plugin directory or archive.
    fn load_plugin(&self, location: &Path) -> Result<PluginDescriptor, DescriptorError>;
}
