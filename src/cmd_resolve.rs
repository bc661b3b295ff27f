//! The `resolve` command.
//!
//! Builds the loading hierarchy an artifact would get when deployed, without
//! running it, and reports which unit serves the requested name.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde_json::json;
use tracing::{debug, warn};

use berth_config::Config;
use berth_core::{Container, DeployableArtifact, ManifestArtifactFactory, ManifestDescriptorLoader, SourceFingerprint};
use berth_protocols::{ArtifactDescriptor, ArtifactKind, DescriptorLoader, LoadingUnit};

pub(crate) enum Lookup {
    Class(String),
    Resource(String),
}

pub(crate) async fn resolve(
    config: &Config,
    location: &Path,
    kind: ArtifactKind,
    lookup: Lookup,
) -> anyhow::Result<()> {
    if !location.is_dir() {
        bail!("{} is not an exploded artifact directory", location.display());
    }

    let loader = ManifestDescriptorLoader::new();
    let container = Container::bootstrap(config, &loader).context("Failed to bootstrap container")?;
    let descriptor = loader
        .load(location, kind)
        .with_context(|| format!("Cannot read descriptor of {}", location.display()))?;

    let domain = match (&descriptor.domain, kind) {
        (Some(domain), ArtifactKind::Application) => {
            let domain_dir = config.domains_dir().join(domain);
            let domain_descriptor = loader
                .load(&domain_dir, ArtifactKind::Domain)
                .with_context(|| format!("Cannot read domain {}", domain))?;
            Some(install(&container, domain_descriptor, container.unit().clone())?)
        }
        _ => None,
    };
    let parent = match &domain {
        Some(domain) => domain
            .unit()
            .context("Domain has no loading unit")?,
        None => container.unit().clone(),
    };
    let artifact = install(&container, descriptor, parent)?;

    let unit = artifact.unit().context("Artifact has no loading unit")?;
    let result = match &lookup {
        Lookup::Class(name) => unit.load_class(name),
        Lookup::Resource(path) => unit.load_resource(path),
    };
    let report = match result {
        Ok(resource) => json!({
            "artifact": artifact.name(),
            "found": true,
            "name": resource.name,
            "unit": resource.unit,
            "source": resource.source,
            "bytes": resource.len(),
        }),
        Err(e) => json!({
            "artifact": artifact.name(),
            "found": false,
            "error": e.to_string(),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    for built in [Some(artifact), domain].into_iter().flatten() {
        if let Err(e) = built.dispose().await {
            warn!("Failed to dispose {}: {}", built.name(), e);
        }
    }
    container.dispose();
    Ok(())
}

/// Build the loading units of one artifact without creating its runtime.
fn install(
    container: &Container,
    descriptor: ArtifactDescriptor,
    parent: Arc<dyn LoadingUnit>,
) -> anyhow::Result<Arc<DeployableArtifact>> {
    let fingerprint = SourceFingerprint::of(&descriptor.location)?;
    let artifact = Arc::new(DeployableArtifact::new(
        descriptor,
        fingerprint,
        parent,
        container.plugins().to_vec(),
        Arc::new(ManifestArtifactFactory::new()),
    ));
    artifact.install()?;
    debug!("Built loading units of {}", artifact.name());
    Ok(artifact)
}
