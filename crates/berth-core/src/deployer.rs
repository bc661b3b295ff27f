//! Drives one artifact through deploy and undeploy.

use std::sync::Arc;

use tracing::warn;

use berth_protocols::{DeploymentError, DeploymentListener, LifecyclePhase, PhaseTiming};

use crate::artifact::DeployableArtifact;

pub struct ArtifactDeployer {
    listener: Arc<dyn DeploymentListener>,
}

impl ArtifactDeployer {
    pub fn new(listener: Arc<dyn DeploymentListener>) -> Self {
        Self { listener }
    }

    /// Install, init and start. On failure the artifact is disposed and the
    /// first error is returned.
    ///
    /// Failed init and start steps dispose inside the failing phase, so the
    /// dispose phase is only reported when it still has work to do.
    pub async fn deploy(&self, artifact: &DeployableArtifact) -> Result<(), DeploymentError> {
        let name = artifact.name();

        let result = async {
            self.phase(name, LifecyclePhase::Install, async { artifact.install() }).await?;
            self.phase(name, LifecyclePhase::Init, artifact.init()).await?;
            self.phase(name, LifecyclePhase::Start, artifact.start()).await
        }
        .await;

        if let Err(e) = result {
            if artifact.is_disposed() {
                return Err(e);
            }
            if let Err(cleanup) = self.phase(name, LifecyclePhase::Dispose, artifact.dispose()).await {
                warn!("Cleanup of {} after failed deployment failed: {}", name, cleanup);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Stop then dispose, each attempted regardless of the other.
    ///
    /// Fails only when both steps failed.
    pub async fn undeploy(&self, artifact: &DeployableArtifact) -> Result<(), DeploymentError> {
        let name = artifact.name();

        let stopped = self.phase(name, LifecyclePhase::Stop, artifact.stop()).await;
        if let Err(e) = &stopped {
            warn!("Failed to stop {}: {}", name, e);
        }
        let disposed = self.phase(name, LifecyclePhase::Dispose, artifact.dispose()).await;
        if let Err(e) = &disposed {
            warn!("Failed to dispose {}: {}", name, e);
        }

        match (stopped, disposed) {
            (Err(stop), Err(dispose)) => Err(DeploymentError::UndeployFailed {
                artifact: name.to_string(),
                message: format!("stop failed: {stop}; dispose failed: {dispose}"),
            }),
            _ => Ok(()),
        }
    }

    async fn phase<F>(&self, name: &str, phase: LifecyclePhase, step: F) -> Result<(), DeploymentError>
    where
        F: Future<Output = Result<(), DeploymentError>>,
    {
        self.listener.on_lifecycle(name, phase, PhaseTiming::Before);
        let result = step.await;
        let timing = match &result {
            Ok(()) => PhaseTiming::After,
            Err(_) => PhaseTiming::Failed,
        };
        self.listener.on_lifecycle(name, phase, timing);
        result
    }
}

#[cfg(test)]
#[path = "deployer_tests.rs"]
mod tests;
