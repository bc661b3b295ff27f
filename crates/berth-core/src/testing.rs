//! Shared fixtures for unit tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use berth_loader::IsolatedUnit;
use berth_protocols::{
    ArtifactDescriptor, ArtifactError, ArtifactFactory, ArtifactRuntime, LifecyclePhase,
    LoadingUnit, LookupPolicy,
};

pub fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

/// A unit with no sources, standing in for the container.
pub fn empty_parent() -> Arc<dyn LoadingUnit> {
    Arc::new(IsolatedUnit::new("container", Vec::new(), None, LookupPolicy::new()))
}

/// Factory whose runtimes record their hooks and can fail one phase.
#[derive(Default)]
pub struct MockFactory {
    pub fail_at: Option<LifecyclePhase>,
    pub created: AtomicUsize,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockFactory {
    pub fn failing(phase: LifecyclePhase) -> Self {
        Self {
            fail_at: Some(phase),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ArtifactFactory for MockFactory {
    async fn create(
        &self,
        _unit: Arc<dyn LoadingUnit>,
        descriptor: &ArtifactDescriptor,
    ) -> Result<Box<dyn ArtifactRuntime>, ArtifactError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockRuntime {
            name: descriptor.name.clone(),
            fail_at: self.fail_at,
            calls: self.calls.clone(),
        }))
    }
}

pub struct MockRuntime {
    name: String,
    fail_at: Option<LifecyclePhase>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockRuntime {
    fn hook(&self, phase: LifecyclePhase) -> Result<(), ArtifactError> {
        self.calls.lock().push(format!("{}:{}", self.name, phase));
        if self.fail_at == Some(phase) {
            return Err(ArtifactError::Custom(format!("{phase} exploded")));
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactRuntime for MockRuntime {
    async fn init(&mut self) -> Result<(), ArtifactError> {
        self.hook(LifecyclePhase::Init)
    }

    async fn start(&mut self) -> Result<(), ArtifactError> {
        self.hook(LifecyclePhase::Start)
    }

    async fn stop(&mut self) -> Result<(), ArtifactError> {
        self.hook(LifecyclePhase::Stop)
    }

    async fn dispose(&mut self) -> Result<(), ArtifactError> {
        self.hook(LifecyclePhase::Dispose)
    }
}
