//! Deployment service.
//!
//! Owns the domain and application registries and serializes every deploy,
//! undeploy, redeploy and scan behind one fair lock. Registry reads never
//! take that lock.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use berth_config::Config;
use berth_loader::archive::is_archive;
use berth_protocols::{
    ArtifactDescriptor, ArtifactFactory, ArtifactKind, ConfigurationError, DeploymentError,
    DeploymentListener, DescriptorLoader, LoadingUnit,
};

use crate::anchor::{clear_anchors, has_anchor, remove_anchor, write_anchor};
use crate::artifact::{ArtifactState, DeployableArtifact, SourceFingerprint};
use crate::container::Container;
use crate::deployer::ArtifactDeployer;
use crate::descriptor::ManifestDescriptorLoader;
use crate::factory::ManifestArtifactFactory;
use crate::installer::{ArchiveInstaller, StagedSource, artifact_name};
use crate::listener::CompositeListener;
use crate::registry::ArtifactRegistry;
use crate::scan::{DirectorySnapshot, ScanDelta, ScanReport};
use crate::shutdown::ShutdownSignal;
use crate::watcher::{DirectoryWatcher, Rescan};
use crate::zombie::{ZombieEntry, ZombieTracker};

/// Deployment settings taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub domains_dir: PathBuf,
    pub apps_dir: PathBuf,
    pub interval: Duration,
    pub watch_events: bool,
    pub applications: Option<Vec<String>>,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            domains_dir: config.domains_dir(),
            apps_dir: config.apps_dir(),
            interval: config.deployment.change_check_interval(),
            watch_events: config.deployment.watch_events,
            applications: config.deployment.applications.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Created = 0,
    Started = 1,
    Stopped = 2,
}

impl From<u8> for ServiceState {
    fn from(v: u8) -> Self {
        match v {
            0 => ServiceState::Created,
            1 => ServiceState::Started,
            _ => ServiceState::Stopped,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Created => "created",
            ServiceState::Started => "started",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Snapshots of the last completed scan. Guarded by the deployment lock.
#[derive(Default)]
struct ScanState {
    domains: DirectorySnapshot,
    apps: DirectorySnapshot,
}

/// Where one deployment attempt got to, for zombie bookkeeping.
struct Attempt {
    fingerprint: Option<SourceFingerprint>,
    state: ArtifactState,
}

struct ServiceInner {
    settings: ServiceSettings,
    container: Container,
    descriptors: Arc<dyn DescriptorLoader>,
    factory: Arc<dyn ArtifactFactory>,
    installer: ArchiveInstaller,
    domains: ArtifactRegistry<DeployableArtifact>,
    applications: ArtifactRegistry<DeployableArtifact>,
    domain_zombies: ZombieTracker,
    app_zombies: ZombieTracker,
    domain_listeners: Arc<CompositeListener>,
    app_listeners: Arc<CompositeListener>,
    lock: tokio::sync::Mutex<ScanState>,
    state: AtomicU8,
    shutdown: ShutdownSignal,
    watcher: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Hosts domains and applications found in the deployment directories.
#[derive(Clone)]
pub struct DeploymentService {
    inner: Arc<ServiceInner>,
}

impl DeploymentService {
    /// Service using the manifest descriptor loader and the manifest factory.
    pub fn new(config: &Config, container: Container) -> Self {
        Self::with_collaborators(
            ServiceSettings::from_config(config),
            container,
            Arc::new(ManifestDescriptorLoader::new()),
            Arc::new(ManifestArtifactFactory::new()),
        )
    }

    pub fn with_collaborators(
        settings: ServiceSettings,
        container: Container,
        descriptors: Arc<dyn DescriptorLoader>,
        factory: Arc<dyn ArtifactFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                settings,
                container,
                descriptors,
                factory,
                installer: ArchiveInstaller::new(),
                domains: ArtifactRegistry::new(),
                applications: ArtifactRegistry::new(),
                domain_zombies: ZombieTracker::new(),
                app_zombies: ZombieTracker::new(),
                domain_listeners: Arc::new(CompositeListener::new()),
                app_listeners: Arc::new(CompositeListener::new()),
                lock: tokio::sync::Mutex::new(ScanState::default()),
                state: AtomicU8::new(ServiceState::Created as u8),
                shutdown: ShutdownSignal::new(),
                watcher: parking_lot::Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.inner.state()
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.inner.settings
    }

    pub fn container(&self) -> &Container {
        &self.inner.container
    }

    pub fn add_application_listener(&self, listener: Arc<dyn DeploymentListener>) {
        self.inner.app_listeners.add(listener);
    }

    pub fn add_domain_listener(&self, listener: Arc<dyn DeploymentListener>) {
        self.inner.domain_listeners.add(listener);
    }

    /// Deploy what is already in the deployment directories and start watching.
    ///
    /// With a fixed application set, every domain and only the listed
    /// applications are deployed, and no watcher runs.
    pub async fn start(&self) -> Result<(), DeploymentError> {
        let inner = &self.inner;
        if let Err(current) = inner.state.compare_exchange(
            ServiceState::Created as u8,
            ServiceState::Started as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            return match ServiceState::from(current) {
                ServiceState::Stopped => Err(DeploymentError::ServiceStopped),
                _ => Ok(()),
            };
        }

        for dir in [&inner.settings.domains_dir, &inner.settings.apps_dir] {
            fs::create_dir_all(dir).map_err(|e| DeploymentError::Install {
                artifact: dir.display().to_string(),
                source: e,
            })?;
            if let Err(e) = clear_anchors(dir) {
                warn!("Failed to clear anchors in {}: {}", dir.display(), e);
            }
        }
        // Artifacts deployed before start keep their anchors.
        for (kind, artifact) in inner.all_artifacts() {
            inner.anchor(kind, artifact.name());
        }

        {
            let mut scan = inner.lock.lock().await;
            let report = match &inner.settings.applications {
                Some(applications) => inner.deploy_fixed_set(&mut scan, applications).await,
                None => inner.scan_locked(&mut scan).await,
            };
            info!(
                "Deployment service started: {} deployed, {} failed",
                report.deployed.len(),
                report.failed.len()
            );
        }

        if inner.settings.applications.is_some() {
            info!("Fixed application set, directory watcher disabled");
            return Ok(());
        }

        let target: Arc<dyn Rescan> = inner.clone();
        let handle = DirectoryWatcher::new(
            Arc::downgrade(&target),
            inner.settings.interval,
            inner.shutdown.clone(),
        )
        .watch(&inner.settings.domains_dir)
        .watch(&inner.settings.apps_dir)
        .with_events(inner.settings.watch_events)
        .spawn();
        *inner.watcher.lock() = Some(handle);
        Ok(())
    }

    /// Stop watching, then undeploy every application and every domain.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let previous = ServiceState::from(inner.state.swap(ServiceState::Stopped as u8, Ordering::SeqCst));
        if previous == ServiceState::Stopped {
            return;
        }

        inner.shutdown.trigger();
        let handle = inner.watcher.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Directory watcher ended abnormally: {}", e);
            }
        }

        let _scan = inner.lock.lock().await;
        for app in inner.applications.snapshot().into_iter().rev() {
            if let Err(e) = inner.undeploy_one(ArtifactKind::Application, app.name(), false).await {
                warn!("Failed to undeploy application {} at shutdown: {}", app.name(), e);
            }
        }
        for domain in inner.domains.snapshot().into_iter().rev() {
            if let Err(e) = inner.undeploy_one(ArtifactKind::Domain, domain.name(), false).await {
                warn!("Failed to undeploy domain {} at shutdown: {}", domain.name(), e);
            }
        }
        info!("Deployment service stopped");
    }

    /// Deploy an application archive or directory, replacing any deployed
    /// application of the same name.
    pub async fn deploy(&self, source: &Path) -> Result<Arc<DeployableArtifact>, DeploymentError> {
        self.inner.deploy_external(ArtifactKind::Application, source).await
    }

    /// Deploy a domain archive or directory, replacing any deployed domain of
    /// the same name.
    pub async fn deploy_domain(&self, source: &Path) -> Result<Arc<DeployableArtifact>, DeploymentError> {
        self.inner.deploy_external(ArtifactKind::Domain, source).await
    }

    /// Undeploy and uninstall an application or domain.
    pub async fn undeploy(&self, name: &str) -> Result<(), DeploymentError> {
        let inner = &self.inner;
        inner.ensure_running()?;
        let mut scan = inner.lock.lock().await;
        let kind = inner.kind_of(name)?;
        let result = inner.undeploy_artifact(kind, name, true).await;
        inner.refresh(&mut scan);
        result
    }

    /// Redeploy an application or domain from its current source.
    pub async fn redeploy(&self, name: &str) -> Result<Arc<DeployableArtifact>, DeploymentError> {
        let inner = &self.inner;
        inner.ensure_running()?;
        let mut scan = inner.lock.lock().await;
        let kind = inner.kind_of(name)?;
        let result = inner.redeploy_artifact(kind, name, None).await;
        inner.refresh(&mut scan);
        result
    }

    /// Scan the deployment directories, waiting for any deployment in flight.
    pub async fn scan(&self) -> Result<ScanReport, DeploymentError> {
        let inner = &self.inner;
        inner.ensure_running()?;
        let mut scan = inner.lock.lock().await;
        Ok(inner.scan_locked(&mut scan).await)
    }

    /// Scan unless a deployment is in flight.
    pub async fn try_scan(&self) -> Result<Option<ScanReport>, DeploymentError> {
        let inner = &self.inner;
        inner.ensure_running()?;
        match inner.lock.try_lock() {
            Ok(mut scan) => Ok(Some(inner.scan_locked(&mut scan).await)),
            Err(_) => Ok(None),
        }
    }

    pub fn find_application(&self, name: &str) -> Option<Arc<DeployableArtifact>> {
        self.inner.applications.get(name)
    }

    pub fn find_domain(&self, name: &str) -> Option<Arc<DeployableArtifact>> {
        self.inner.domains.get(name)
    }

    pub fn applications(&self) -> Vec<Arc<DeployableArtifact>> {
        self.inner.applications.snapshot()
    }

    pub fn domains(&self) -> Vec<Arc<DeployableArtifact>> {
        self.inner.domains.snapshot()
    }

    /// Failed deployments, domains first.
    pub fn zombies(&self) -> Vec<(ArtifactKind, String, ZombieEntry)> {
        let domains = self
            .inner
            .domain_zombies
            .entries()
            .into_iter()
            .map(|(name, entry)| (ArtifactKind::Domain, name, entry));
        let apps = self
            .inner
            .app_zombies
            .entries()
            .into_iter()
            .map(|(name, entry)| (ArtifactKind::Application, name, entry));
        domains.chain(apps).collect()
    }
}

impl ServiceInner {
    fn state(&self) -> ServiceState {
        ServiceState::from(self.state.load(Ordering::SeqCst))
    }

    fn ensure_running(&self) -> Result<(), DeploymentError> {
        match self.state() {
            ServiceState::Stopped => Err(DeploymentError::ServiceStopped),
            _ => Ok(()),
        }
    }

    fn registry(&self, kind: ArtifactKind) -> &ArtifactRegistry<DeployableArtifact> {
        match kind {
            ArtifactKind::Domain => &self.domains,
            _ => &self.applications,
        }
    }

    fn zombies(&self, kind: ArtifactKind) -> &ZombieTracker {
        match kind {
            ArtifactKind::Domain => &self.domain_zombies,
            _ => &self.app_zombies,
        }
    }

    fn listener(&self, kind: ArtifactKind) -> Arc<CompositeListener> {
        match kind {
            ArtifactKind::Domain => self.domain_listeners.clone(),
            _ => self.app_listeners.clone(),
        }
    }

    fn kind_dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Domain => &self.settings.domains_dir,
            _ => &self.settings.apps_dir,
        }
    }

    fn kind_of(&self, name: &str) -> Result<ArtifactKind, DeploymentError> {
        if self.applications.contains(name) {
            Ok(ArtifactKind::Application)
        } else if self.domains.contains(name) {
            Ok(ArtifactKind::Domain)
        } else {
            Err(DeploymentError::NotFound(name.to_string()))
        }
    }

    fn all_artifacts(&self) -> Vec<(ArtifactKind, Arc<DeployableArtifact>)> {
        let domains = self.domains.snapshot().into_iter().map(|a| (ArtifactKind::Domain, a));
        let apps = self
            .applications
            .snapshot()
            .into_iter()
            .map(|a| (ArtifactKind::Application, a));
        domains.chain(apps).collect()
    }

    fn domain_applications(&self, domain: &str) -> Vec<Arc<DeployableArtifact>> {
        self.applications
            .snapshot()
            .into_iter()
            .filter(|app| app.domain() == Some(domain))
            .collect()
    }

    fn anchor(&self, kind: ArtifactKind, name: &str) {
        if let Err(e) = write_anchor(self.kind_dir(kind), name) {
            warn!("Failed to write anchor for {} {}: {}", kind, name, e);
        }
    }

    fn refresh(&self, scan: &mut ScanState) {
        match DirectorySnapshot::take(&self.settings.domains_dir) {
            Ok(snapshot) => scan.domains = snapshot,
            Err(e) => warn!("Failed to read {}: {}", self.settings.domains_dir.display(), e),
        }
        match DirectorySnapshot::take(&self.settings.apps_dir) {
            Ok(snapshot) => scan.apps = snapshot,
            Err(e) => warn!("Failed to read {}: {}", self.settings.apps_dir.display(), e),
        }
    }

    /// Current source of `name` in its kind directory.
    fn current_source(&self, kind: ArtifactKind, name: &str) -> Option<PathBuf> {
        DirectorySnapshot::take(self.kind_dir(kind))
            .ok()?
            .source(name)
            .cloned()
    }

    async fn deploy_external(
        &self,
        kind: ArtifactKind,
        source: &Path,
    ) -> Result<Arc<DeployableArtifact>, DeploymentError> {
        self.ensure_running()?;
        let mut scan = self.lock.lock().await;

        let name = artifact_name(source).ok_or_else(|| invalid_source(source))?;
        let staged = self
            .installer
            .stage(source, self.kind_dir(kind))
            .map_err(|e| DeploymentError::Install {
                artifact: name.clone(),
                source: e,
            })?;
        self.zombies(kind).clear(&name);

        let result = if self.registry(kind).contains(&name) {
            self.redeploy_artifact(kind, &name, Some(staged)).await
        } else {
            match self.installer.commit(staged) {
                Ok(target) => self.deploy_source(kind, &target).await,
                Err(e) => Err(DeploymentError::Install {
                    artifact: name.clone(),
                    source: e,
                }),
            }
        };
        self.refresh(&mut scan);
        result
    }

    /// Deploy one source and record the outcome.
    async fn deploy_source(
        &self,
        kind: ArtifactKind,
        source: &Path,
    ) -> Result<Arc<DeployableArtifact>, DeploymentError> {
        let name = artifact_name(source).ok_or_else(|| invalid_source(source))?;
        let listener = self.listener(kind);
        listener.on_deployment_start(&name);

        let mut attempt = Attempt {
            fingerprint: None,
            state: ArtifactState::Uninstalled,
        };
        match self.try_deploy(kind, &name, source, &mut attempt).await {
            Ok(artifact) => {
                self.anchor(kind, &name);
                self.zombies(kind).clear(&name);
                listener.on_deployment_success(&name);
                Ok(artifact)
            }
            Err(e) => {
                if let Some(fingerprint) = &attempt.fingerprint {
                    self.zombies(kind).record(&name, fingerprint, attempt.state, &e);
                }
                listener.on_deployment_failure(&name, &e);
                Err(e)
            }
        }
    }

    async fn try_deploy(
        &self,
        kind: ArtifactKind,
        name: &str,
        source: &Path,
        attempt: &mut Attempt,
    ) -> Result<Arc<DeployableArtifact>, DeploymentError> {
        let install_error = |e: io::Error| DeploymentError::Install {
            artifact: name.to_string(),
            source: e,
        };

        attempt.fingerprint = Some(SourceFingerprint::of(source).map_err(install_error)?);
        let location = if is_archive(source) {
            let location = self.installer.install(source).map_err(install_error)?;
            // The archive is gone; later scans see the exploded directory.
            attempt.fingerprint = Some(SourceFingerprint::of(&location).map_err(install_error)?);
            location
        } else {
            source.to_path_buf()
        };

        let mut descriptor = self
            .descriptors
            .load(&location, kind)
            .map_err(|source| DeploymentError::Descriptor {
                artifact: name.to_string(),
                source,
            })?;
        if descriptor.name != name {
            warn!(
                "{} at {} declares name '{}', deploying it as '{}'",
                kind,
                location.display(),
                descriptor.name,
                name
            );
            descriptor.name = name.to_string();
        }

        let parent = self.parent_unit(&descriptor)?;
        let fingerprint = match &attempt.fingerprint {
            Some(fingerprint) => fingerprint.clone(),
            None => SourceFingerprint::of(&location).map_err(install_error)?,
        };
        let artifact = Arc::new(DeployableArtifact::new(
            descriptor,
            fingerprint,
            parent,
            self.container.plugins().to_vec(),
            self.factory.clone(),
        ));

        let deployer = ArtifactDeployer::new(self.listener(kind));
        let deployed = deployer.deploy(&artifact).await;
        attempt.state = artifact.state();
        deployed?;

        if let Err(e) = self.registry(kind).register(artifact.clone()) {
            if let Err(cleanup) = deployer.undeploy(&artifact).await {
                warn!("Failed to release unregistered {} {}: {}", kind, name, cleanup);
            }
            return Err(DeploymentError::wrap(name, e));
        }
        Ok(artifact)
    }

    /// Owning domain's unit for applications that name one, else the container.
    fn parent_unit(&self, descriptor: &ArtifactDescriptor) -> Result<Arc<dyn LoadingUnit>, DeploymentError> {
        match (descriptor.kind, &descriptor.domain) {
            (ArtifactKind::Application, Some(domain)) => self
                .domains
                .get(domain)
                .and_then(|artifact| artifact.unit())
                .ok_or_else(|| {
                    DeploymentError::configuration(
                        &descriptor.name,
                        ConfigurationError::MissingDomain {
                            artifact: descriptor.name.clone(),
                            domain: domain.clone(),
                        },
                    )
                }),
            _ => Ok(self.container.unit().clone()),
        }
    }

    /// Undeploy one artifact; a domain's applications go first.
    async fn undeploy_artifact(
        &self,
        kind: ArtifactKind,
        name: &str,
        uninstall: bool,
    ) -> Result<(), DeploymentError> {
        if kind == ArtifactKind::Domain {
            for app in self.domain_applications(name) {
                if let Err(e) = self.undeploy_one(ArtifactKind::Application, app.name(), false).await {
                    warn!("Failed to undeploy application {} of domain {}: {}", app.name(), name, e);
                }
            }
        }
        self.undeploy_one(kind, name, uninstall).await
    }

    async fn undeploy_one(
        &self,
        kind: ArtifactKind,
        name: &str,
        uninstall: bool,
    ) -> Result<(), DeploymentError> {
        let artifact = self
            .registry(kind)
            .unregister(name)
            .map_err(|_| DeploymentError::NotFound(name.to_string()))?;
        let listener = self.listener(kind);
        listener.on_undeployment_start(name);

        let result = ArtifactDeployer::new(listener.clone()).undeploy(&artifact).await;

        if let Err(e) = remove_anchor(self.kind_dir(kind), name) {
            warn!("Failed to remove anchor of {} {}: {}", kind, name, e);
        }
        if uninstall {
            if let Err(e) = self.installer.uninstall(&artifact.descriptor().location) {
                warn!("Failed to uninstall {} {}: {}", kind, name, e);
            }
        }
        self.zombies(kind).clear(name);

        match result {
            Ok(()) => {
                listener.on_undeployment_success(name);
                Ok(())
            }
            Err(e) => {
                listener.on_undeployment_failure(name, &e);
                Err(e)
            }
        }
    }

    /// Undeploy and deploy again from `source`, or from the current source.
    ///
    /// A staged copy replaces the old source only once the old instance is
    /// undeployed. Redeploying a domain redeploys its applications afterwards.
    async fn redeploy_artifact(
        &self,
        kind: ArtifactKind,
        name: &str,
        source: Option<StagedSource>,
    ) -> Result<Arc<DeployableArtifact>, DeploymentError> {
        let Some(existing) = self.registry(kind).get(name) else {
            if let Some(staged) = source {
                if let Err(e) = self.installer.discard(staged) {
                    debug!("Could not discard staged source of {}: {}", name, e);
                }
            }
            return Err(DeploymentError::NotFound(name.to_string()));
        };
        let staged = source.unwrap_or_else(|| {
            StagedSource::InPlace(
                self.current_source(kind, name)
                    .unwrap_or_else(|| existing.descriptor().location.clone()),
            )
        });
        let dependents: Vec<PathBuf> = match kind {
            ArtifactKind::Domain => self
                .domain_applications(name)
                .iter()
                .map(|app| {
                    self.current_source(ArtifactKind::Application, app.name())
                        .unwrap_or_else(|| app.descriptor().location.clone())
                })
                .collect(),
            _ => Vec::new(),
        };

        info!("Redeploying {} {}", kind, name);
        if let Err(e) = self.undeploy_artifact(kind, name, false).await {
            warn!("Undeploy of {} {} before redeploy failed: {}", kind, name, e);
        }
        let result = match self.installer.commit(staged) {
            Ok(source) => self.deploy_source(kind, &source).await,
            Err(e) => {
                warn!("Cannot replace source of {} {}: {}", kind, name, e);
                Err(DeploymentError::Install {
                    artifact: name.to_string(),
                    source: e,
                })
            }
        };

        for app in dependents {
            if let Err(e) = self.deploy_source(ArtifactKind::Application, &app).await {
                warn!("Failed to redeploy application {} after domain {}: {}", app.display(), name, e);
            }
        }
        result
    }

    async fn scan_locked(&self, scan: &mut ScanState) -> ScanReport {
        let mut report = ScanReport::default();
        let snapshots = DirectorySnapshot::take(&self.settings.domains_dir)
            .and_then(|domains| Ok((domains, DirectorySnapshot::take(&self.settings.apps_dir)?)));
        let (domains, apps) = match snapshots {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!("Failed to scan deployment directories: {}", e);
                return report;
            }
        };
        let domain_delta = domains.delta(&scan.domains);
        let app_delta = apps.delta(&scan.apps);
        trace!(?domain_delta, ?app_delta, "Scanned deployment directories");

        self.remove_stale(ArtifactKind::Application, &app_delta, &mut report).await;
        self.remove_stale(ArtifactKind::Domain, &domain_delta, &mut report).await;
        self.deploy_changed(ArtifactKind::Domain, &domains, &domain_delta, &mut report).await;
        self.deploy_changed(ArtifactKind::Application, &apps, &app_delta, &mut report).await;

        self.refresh(scan);
        if !report.is_empty() {
            debug!(?report, "Scan finished");
        }
        report
    }

    /// Undeploy artifacts whose source or anchor disappeared.
    async fn remove_stale(&self, kind: ArtifactKind, delta: &ScanDelta, report: &mut ScanReport) {
        for name in &delta.removed {
            self.zombies(kind).clear(name);
            if self.registry(kind).contains(name) {
                info!("{} {} was removed", kind, name);
                match self.undeploy_artifact(kind, name, false).await {
                    Ok(()) => report.undeployed.push(name.clone()),
                    Err(_) => report.failed.push(name.clone()),
                }
            }
        }

        let dir = self.kind_dir(kind);
        for artifact in self.registry(kind).snapshot() {
            if has_anchor(dir, artifact.name()) || !self.registry(kind).contains(artifact.name()) {
                continue;
            }
            info!("Anchor of {} {} was deleted", kind, artifact.name());
            match self.undeploy_artifact(kind, artifact.name(), true).await {
                Ok(()) => report.undeployed.push(artifact.name().to_string()),
                Err(_) => report.failed.push(artifact.name().to_string()),
            }
        }
    }

    /// Deploy new sources and redeploy changed ones, skipping zombies.
    async fn deploy_changed(
        &self,
        kind: ArtifactKind,
        snapshot: &DirectorySnapshot,
        delta: &ScanDelta,
        report: &mut ScanReport,
    ) {
        for (name, fingerprint) in snapshot.iter() {
            if let Some(existing) = self.registry(kind).get(name) {
                if !delta.is_changed(name) {
                    continue;
                }
                if !existing.descriptor().redeployment_enabled {
                    info!("{} {} changed but redeployment is disabled", kind, name);
                    continue;
                }
                let staged = StagedSource::InPlace(fingerprint.path.clone());
                match self.redeploy_artifact(kind, name, Some(staged)).await {
                    Ok(_) => report.redeployed.push(name.to_string()),
                    Err(_) => report.failed.push(name.to_string()),
                }
            } else if self.zombies(kind).is_zombie(name, fingerprint) {
                trace!("Skipping {} {}, unchanged since it failed", kind, name);
            } else if self.is_selected(kind, name) {
                match self.deploy_source(kind, &fingerprint.path).await {
                    Ok(_) => report.deployed.push(name.to_string()),
                    Err(_) => report.failed.push(name.to_string()),
                }
            }
        }
    }

    fn is_selected(&self, kind: ArtifactKind, name: &str) -> bool {
        match (&self.settings.applications, kind) {
            (Some(applications), ArtifactKind::Application) => applications.iter().any(|a| a == name),
            _ => true,
        }
    }

    async fn deploy_fixed_set(&self, scan: &mut ScanState, applications: &[String]) -> ScanReport {
        let mut report = ScanReport::default();

        match DirectorySnapshot::take(&self.settings.domains_dir) {
            Ok(domains) => {
                for (name, fingerprint) in domains.iter() {
                    match self.deploy_source(ArtifactKind::Domain, &fingerprint.path).await {
                        Ok(_) => report.deployed.push(name.to_string()),
                        Err(_) => report.failed.push(name.to_string()),
                    }
                }
            }
            Err(e) => warn!("Failed to read {}: {}", self.settings.domains_dir.display(), e),
        }

        let apps = DirectorySnapshot::take(&self.settings.apps_dir).unwrap_or_default();
        for name in applications {
            let Some(fingerprint) = apps.get(name) else {
                warn!("Application {} is not in {}", name, self.settings.apps_dir.display());
                continue;
            };
            match self.deploy_source(ArtifactKind::Application, &fingerprint.path).await {
                Ok(_) => report.deployed.push(name.clone()),
                Err(_) => report.failed.push(name.clone()),
            }
        }

        self.refresh(scan);
        report
    }
}

#[async_trait]
impl Rescan for ServiceInner {
    async fn rescan(&self) {
        if self.state() != ServiceState::Started {
            return;
        }
        match self.lock.try_lock() {
            Ok(mut scan) => {
                self.scan_locked(&mut scan).await;
            }
            Err(_) => debug!("Deployment in progress, skipping scan"),
        }
    }
}

fn invalid_source(source: &Path) -> DeploymentError {
    DeploymentError::Install {
        artifact: source.display().to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "cannot derive artifact name"),
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
