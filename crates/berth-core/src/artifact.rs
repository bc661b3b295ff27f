//! Deployable artifact and its lifecycle state machine.
//!
//! ```text
//! Uninstalled → Installed → Initialised → Started ⇄ Stopped → Disposed
//!                               └────────────┴── failure ──→ Failed
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use berth_loader::{ArtifactUnitBuilder, ArtifactUnits, PluginUnit};
use berth_protocols::{
    ArtifactDescriptor, ArtifactError, ArtifactFactory, ArtifactKind, ArtifactRuntime,
    DeploymentError, DescriptorError, LoadingUnit,
};

use crate::descriptor::ARTIFACT_MANIFEST;
use crate::registry::Registerable;

/// Lifecycle state of a deployable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ArtifactState {
    Uninstalled = 0,
    Installed = 1,
    Initialised = 2,
    Started = 3,
    Stopped = 4,
    Disposed = 5,
    Failed = 6,
}

impl From<u8> for ArtifactState {
    fn from(v: u8) -> Self {
        match v {
            0 => ArtifactState::Uninstalled,
            1 => ArtifactState::Installed,
            2 => ArtifactState::Initialised,
            3 => ArtifactState::Started,
            4 => ArtifactState::Stopped,
            5 => ArtifactState::Disposed,
            _ => ArtifactState::Failed,
        }
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactState::Uninstalled => "uninstalled",
            ArtifactState::Installed => "installed",
            ArtifactState::Initialised => "initialised",
            ArtifactState::Started => "started",
            ArtifactState::Stopped => "stopped",
            ArtifactState::Disposed => "disposed",
            ArtifactState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Identity of an artifact source at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFingerprint {
    pub path: PathBuf,
    pub last_modified: SystemTime,
}

impl SourceFingerprint {
    pub fn new(path: impl Into<PathBuf>, last_modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            last_modified,
        }
    }

    /// Fingerprint a packaged archive or an exploded directory.
    ///
    /// Archives use their own mtime. Directories use the mtime of their
    /// `artifact.toml`, or of the directory when there is none.
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let last_modified = if metadata.is_dir() {
            match fs::metadata(path.join(ARTIFACT_MANIFEST)) {
                Ok(manifest) => manifest.modified()?,
                Err(_) => metadata.modified()?,
            }
        } else {
            metadata.modified()?
        };
        Ok(Self::new(path, last_modified))
    }
}

/// One domain or application moving through its lifecycle.
///
/// Transitions are not internally serialized; the deployment service drives
/// every artifact from under its deployment lock.
pub struct DeployableArtifact {
    descriptor: ArtifactDescriptor,
    fingerprint: SourceFingerprint,
    parent: Arc<dyn LoadingUnit>,
    container_plugins: Vec<PluginUnit>,
    factory: Arc<dyn ArtifactFactory>,
    state: AtomicU8,
    disposed: AtomicBool,
    units: Mutex<Option<Arc<ArtifactUnits>>>,
    runtime: tokio::sync::Mutex<Option<Box<dyn ArtifactRuntime>>>,
}

impl DeployableArtifact {
    pub fn new(
        descriptor: ArtifactDescriptor,
        fingerprint: SourceFingerprint,
        parent: Arc<dyn LoadingUnit>,
        container_plugins: Vec<PluginUnit>,
        factory: Arc<dyn ArtifactFactory>,
    ) -> Self {
        Self {
            descriptor,
            fingerprint,
            parent,
            container_plugins,
            factory,
            state: AtomicU8::new(ArtifactState::Uninstalled as u8),
            disposed: AtomicBool::new(false),
            units: Mutex::new(None),
            runtime: tokio::sync::Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.descriptor.kind
    }

    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    pub fn fingerprint(&self) -> &SourceFingerprint {
        &self.fingerprint
    }

    /// Name of the owning domain, for applications that declare one.
    pub fn domain(&self) -> Option<&str> {
        self.descriptor.domain.as_deref()
    }

    pub fn state(&self) -> ArtifactState {
        ArtifactState::from(self.state.load(Ordering::SeqCst))
    }

    /// The units built at install, until dispose releases them.
    pub fn units(&self) -> Option<Arc<ArtifactUnits>> {
        self.units.lock().clone()
    }

    /// The artifact-specific unit, available between install and dispose.
    pub fn unit(&self) -> Option<Arc<dyn LoadingUnit>> {
        self.units().map(|units| units.unit().clone())
    }

    fn set_state(&self, state: ArtifactState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn transition(&self, allowed: &[ArtifactState], to: ArtifactState) -> Result<(), DeploymentError> {
        let from = self.state();
        if allowed.contains(&from) {
            Ok(())
        } else {
            Err(DeploymentError::InvalidTransition {
                artifact: self.name().to_string(),
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Whether [`dispose`](Self::dispose) already ran.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Build the loading hierarchy. A failure leaves the artifact uninstalled.
    pub fn install(&self) -> Result<(), DeploymentError> {
        if self.is_disposed() {
            return Err(DeploymentError::InvalidTransition {
                artifact: self.name().to_string(),
                from: ArtifactState::Disposed.to_string(),
                to: ArtifactState::Installed.to_string(),
            });
        }
        self.transition(&[ArtifactState::Uninstalled], ArtifactState::Installed)?;

        if !self.descriptor.location.is_dir() {
            return Err(DeploymentError::Descriptor {
                artifact: self.name().to_string(),
                source: DescriptorError::LocationNotFound(
                    self.descriptor.location.display().to_string(),
                ),
            });
        }

        let units = ArtifactUnitBuilder::new(self.container_plugins.clone())
            .with_descriptor(self.descriptor.clone())
            .with_parent(self.parent.clone())
            .build()
            .map_err(|e| DeploymentError::configuration(self.name(), e))?;

        *self.units.lock() = Some(Arc::new(units));
        self.set_state(ArtifactState::Installed);
        debug!("Installed {} {}", self.kind(), self.name());
        Ok(())
    }

    /// Create the runtime through the factory and run its init hook.
    pub async fn init(&self) -> Result<(), DeploymentError> {
        self.transition(&[ArtifactState::Installed], ArtifactState::Initialised)?;

        let Some(unit) = self.unit() else {
            return Err(self.fail(ArtifactError::InitializationFailed("no loading unit".into())).await);
        };

        let mut runtime = match self.factory.create(unit, &self.descriptor).await {
            Ok(runtime) => runtime,
            Err(e) => return Err(self.fail(e).await),
        };
        if let Err(e) = runtime.init().await {
            *self.runtime.lock().await = Some(runtime);
            return Err(self.fail(e).await);
        }

        *self.runtime.lock().await = Some(runtime);
        self.set_state(ArtifactState::Initialised);
        debug!("Initialised {} {}", self.kind(), self.name());
        Ok(())
    }

    pub async fn start(&self) -> Result<(), DeploymentError> {
        self.transition(
            &[ArtifactState::Initialised, ArtifactState::Stopped],
            ArtifactState::Started,
        )?;

        let result = match self.runtime.lock().await.as_mut() {
            Some(runtime) => runtime.start().await,
            None => Err(ArtifactError::StartFailed("no runtime".into())),
        };
        if let Err(e) = result {
            return Err(self.fail(e).await);
        }

        self.set_state(ArtifactState::Started);
        info!("Started {} {}", self.kind(), self.name());
        Ok(())
    }

    /// Stop a started artifact. Anything else is left as is.
    ///
    /// A failing stop hook is reported, but the artifact is still considered
    /// stopped so dispose can proceed.
    pub async fn stop(&self) -> Result<(), DeploymentError> {
        if self.state() != ArtifactState::Started {
            debug!("{} {} is {}, nothing to stop", self.kind(), self.name(), self.state());
            return Ok(());
        }

        let result = match self.runtime.lock().await.as_mut() {
            Some(runtime) => runtime.stop().await,
            None => Ok(()),
        };
        self.set_state(ArtifactState::Stopped);

        match result {
            Ok(()) => {
                info!("Stopped {} {}", self.kind(), self.name());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to stop {} {}: {}", self.kind(), self.name(), e);
                Err(DeploymentError::wrap(self.name(), e))
            }
        }
    }

    /// Release the runtime and every owned unit.
    ///
    /// Runs once; later calls return `Ok`. Every step runs even when an
    /// earlier one failed. Failed and never installed artifacts keep their
    /// state.
    pub async fn dispose(&self) -> Result<(), DeploymentError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut failure = None;
        if let Some(mut runtime) = self.runtime.lock().await.take() {
            if let Err(e) = runtime.dispose().await {
                warn!("Failed to dispose runtime of {}: {}", self.name(), e);
                failure = Some(e);
            }
        }

        let units = self.units.lock().take();
        if let Some(units) = units {
            let count = units.dispose_all();
            debug!("Disposed {} units of {}", count, self.name());
        }

        if !matches!(self.state(), ArtifactState::Failed | ArtifactState::Uninstalled) {
            self.set_state(ArtifactState::Disposed);
        }

        match failure {
            Some(e) => Err(DeploymentError::wrap(self.name(), e)),
            None => Ok(()),
        }
    }

    /// Mark the artifact failed, release it, and wrap the root cause.
    async fn fail(&self, error: ArtifactError) -> DeploymentError {
        self.set_state(ArtifactState::Failed);
        if let Err(e) = self.dispose().await {
            warn!("Cleanup after failure of {} also failed: {}", self.name(), e);
        }
        DeploymentError::wrap(self.name(), error)
    }
}

impl Registerable for DeployableArtifact {
    fn registry_id(&self) -> &str {
        self.name()
    }
}

impl fmt::Debug for DeployableArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployableArtifact")
            .field("name", &self.descriptor.name)
            .field("kind", &self.descriptor.kind)
            .field("state", &self.state())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
