//! # Berth Protocols
//!
//! Shared types and collaborator traits for the Berth deployment engine.
//! Contains only definitions; implementations live in `berth-loader` and `berth-core`.
//!
//! ## Core Traits
//!
//! - [`LoadingUnit`] - Scoped code and resource resolver
//! - [`DescriptorLoader`] - Produces artifact descriptors
//! - [`ArtifactFactory`] - Produces runnable artifacts
//! - [`ArtifactRuntime`] - Lifecycle hooks of a runnable artifact
//! - [`DeploymentListener`] - Deployment observer

pub mod descriptor;
pub mod error;
pub mod listener;
pub mod loading;
pub mod policy;
pub mod runtime;

pub use descriptor::{ArtifactDescriptor, ArtifactKind, PluginDescriptor};
pub use error::{
    ArtifactError, BoxError, ConfigurationError, DeploymentError, DescriptorError, LoadError,
};
pub use listener::{DeploymentListener, LifecyclePhase, PhaseTiming};
pub use loading::{LoadingUnit, Resource, class_resource_path, package_of, package_of_class};
pub use policy::{LookupOrder, LookupPolicy};
pub use runtime::{ArtifactFactory, ArtifactRuntime, DescriptorLoader};
