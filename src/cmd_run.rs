//! The `run` command: host domains and applications until a shutdown signal.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use berth_config::Config;
use berth_core::{Container, DeploymentService, LoggingListener, ManifestDescriptorLoader, shutdown};

pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    info!("Starting Berth v{}", env!("CARGO_PKG_VERSION"));
    info!("Container home: {}", config.home().display());

    shutdown::install();
    let container = Container::bootstrap(&config, &ManifestDescriptorLoader::new())
        .context("Failed to bootstrap container")?;
    container
        .register_shutdown_hook()
        .context("Failed to register container shutdown hook")?;

    let service = DeploymentService::new(&config, container);
    let listener = Arc::new(LoggingListener);
    service.add_domain_listener(listener.clone());
    service.add_application_listener(listener);
    service.start().await.context("Failed to start deployment service")?;

    info!(
        "Hosting {} domains and {} applications",
        service.domains().len(),
        service.applications().len()
    );
    for (kind, name, zombie) in service.zombies() {
        warn!("{} {} failed to deploy: {}", kind, name, zombie.error);
    }

    wait_for_signal().await;
    info!("Shutdown signal received");

    service.stop().await;
    let hooks = shutdown::run().await;
    info!("Ran {} shutdown hooks, exiting", hooks);
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
            }
            return;
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Cannot listen for Ctrl-C: {}", e);
            }
        }
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
    }
}
