//! Listener fan-out.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use berth_protocols::{DeploymentError, DeploymentListener, LifecyclePhase, PhaseTiming};

/// Delivers every notification to each registered listener in order.
///
/// A panicking listener is logged and skipped; the others still run.
#[derive(Default)]
pub struct CompositeListener {
    listeners: RwLock<Vec<Arc<dyn DeploymentListener>>>,
}

impl CompositeListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn DeploymentListener>) {
        self.listeners.write().push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn DeploymentListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    fn each(&self, event: &str, notify: impl Fn(&dyn DeploymentListener)) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            let result = catch_unwind(AssertUnwindSafe(|| notify(listener.as_ref())));
            if result.is_err() {
                error!("Deployment listener panicked during {}", event);
            }
        }
    }
}

impl DeploymentListener for CompositeListener {
    fn on_deployment_start(&self, artifact: &str) {
        self.each("deployment start", |l| l.on_deployment_start(artifact));
    }

    fn on_deployment_success(&self, artifact: &str) {
        self.each("deployment success", |l| l.on_deployment_success(artifact));
    }

    fn on_deployment_failure(&self, artifact: &str, err: &DeploymentError) {
        self.each("deployment failure", |l| l.on_deployment_failure(artifact, err));
    }

    fn on_undeployment_start(&self, artifact: &str) {
        self.each("undeployment start", |l| l.on_undeployment_start(artifact));
    }

    fn on_undeployment_success(&self, artifact: &str) {
        self.each("undeployment success", |l| l.on_undeployment_success(artifact));
    }

    fn on_undeployment_failure(&self, artifact: &str, err: &DeploymentError) {
        self.each("undeployment failure", |l| l.on_undeployment_failure(artifact, err));
    }

    fn on_lifecycle(&self, artifact: &str, phase: LifecyclePhase, timing: PhaseTiming) {
        self.each("lifecycle", |l| l.on_lifecycle(artifact, phase, timing));
    }
}

/// Writes deployment events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl DeploymentListener for LoggingListener {
    fn on_deployment_start(&self, artifact: &str) {
        info!("Deploying {}", artifact);
    }

    fn on_deployment_success(&self, artifact: &str) {
        info!("Deployed {}", artifact);
    }

    fn on_deployment_failure(&self, artifact: &str, err: &DeploymentError) {
        error!("Failed to deploy {}: {}", artifact, err);
    }

    fn on_undeployment_start(&self, artifact: &str) {
        info!("Undeploying {}", artifact);
    }

    fn on_undeployment_success(&self, artifact: &str) {
        info!("Undeployed {}", artifact);
    }

    fn on_undeployment_failure(&self, artifact: &str, err: &DeploymentError) {
        warn!("Failed to undeploy {}: {}", artifact, err);
    }

    fn on_lifecycle(&self, artifact: &str, phase: LifecyclePhase, timing: PhaseTiming) {
        debug!(artifact, %phase, ?timing, "Lifecycle");
    }
}
