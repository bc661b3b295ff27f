//! # Berth Core
//!
//! Container bootstrap, artifact lifecycle and the deployment service.
//!
//! ## Components
//!
//! - [`Container`] - Container loading unit and container plugins
//! - [`DeployableArtifact`] - One domain or application and its lifecycle
//! - [`ArtifactDeployer`] - Deploy and undeploy with lifecycle notifications
//! - [`DeploymentService`] - Registries, directory scanning and redeployment
//!
//! ## Deployment directories
//!
//! Domains and applications are dropped into their directories as exploded
//! directories or `.tar.gz` archives. Each deployed artifact gets a
//! `<name>-anchor.txt` file next to it; deleting the anchor undeploys it.

pub mod anchor;
pub mod artifact;
pub mod container;
pub mod deployer;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod installer;
pub mod listener;
pub mod registry;
pub mod scan;
pub mod service;
pub mod shutdown;
pub mod watcher;
pub mod zombie;

#[cfg(test)]
mod testing;

pub use artifact::{ArtifactState, DeployableArtifact, SourceFingerprint};
pub use container::{CONTAINER_UNIT, Container};
pub use deployer::ArtifactDeployer;
pub use descriptor::ManifestDescriptorLoader;
pub use error::{ContainerError, RegistryError, ShutdownError};
pub use factory::ManifestArtifactFactory;
pub use installer::{ArchiveInstaller, StagedSource};
pub use listener::{CompositeListener, LoggingListener};
pub use registry::{ArtifactRegistry, Registerable};
pub use scan::{DirectorySnapshot, ScanDelta, ScanReport};
pub use service::{DeploymentService, ServiceSettings, ServiceState};
pub use shutdown::ShutdownSignal;
pub use watcher::{DirectoryWatcher, Rescan};
pub use zombie::{ZombieEntry, ZombieTracker};
