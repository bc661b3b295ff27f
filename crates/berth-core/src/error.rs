//! Errors of the container and its registries.

use thiserror::Error;

use berth_protocols::{DescriptorError, LoadError};

/// Container bootstrap failures. Fatal to the host.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Failed to open container sources: {0}")]
    Load(#[from] LoadError),

    #[error("Invalid container plugin: {0}")]
    Plugin(#[from] DescriptorError),

    #[error("Container plugin {0} is bundled more than once")]
    DuplicatePlugin(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Artifact already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Artifact not registered: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("Shutdown hooks are not installed")]
    NotInstalled,

    #[error("Shutdown hook already registered: {0}")]
    AlreadyRegistered(String),
}
