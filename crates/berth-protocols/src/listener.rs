//! Deployment listener protocol.
//!
//! Callbacks are delivered synchronously on the deployment task, in order.
//! Every method has a no-op default so listeners implement only what they need.

use std::fmt;

use crate::error::DeploymentError;

/// Lifecycle step of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Install,
    Init,
    Start,
    Stop,
    Dispose,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Install => "install",
            LifecyclePhase::Init => "init",
            LifecyclePhase::Start => "start",
            LifecyclePhase::Stop => "stop",
            LifecyclePhase::Dispose => "dispose",
        };
        f.write_str(name)
    }
}

/// When a lifecycle notification fires relative to its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseTiming {
    Before,
    After,
    Failed,
}

/// Observer of deployments and undeployments.
#[allow(unused_variables)]
pub trait DeploymentListener: Send + Sync {
    fn on_deployment_start(&self, artifact: &str) {}

    fn on_deployment_success(&self, artifact: &str) {}

    fn on_deployment_failure(&self, artifact: &str, error: &DeploymentError) {}

    fn on_undeployment_start(&self, artifact: &str) {}

    fn on_undeployment_success(&self, artifact: &str) {}

    fn on_undeployment_failure(&self, artifact: &str, error: &DeploymentError) {}

    /// Before and after each lifecycle phase, or when the phase failed.
    fn on_lifecycle(&self, artifact: &str, phase: LifecyclePhase, timing: PhaseTiming) {}
}
