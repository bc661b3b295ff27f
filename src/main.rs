//! Berth - artifact isolation and deployment host.
//!
//! Bootstraps the container, deploys the domains and applications found in
//! the deployment directories and keeps them in sync until shutdown.

mod cli;
mod cmd_resolve;
mod cmd_run;

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use berth_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};

use cli::{Cli, Commands};
use cmd_resolve::Lookup;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize tracing with console output and an optional rolling log file.
///
/// `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console = if logging.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let file = match &logging.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("berth")
                .filename_suffix("log")
                .max_log_files(30)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();
    Ok(())
}

fn load_config(path: Option<&PathBuf>, home: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = ConfigLoader::load_or_default(path.map(PathBuf::as_path))
        .context("Failed to load configuration")?;
    if let Some(home) = home {
        config.container.home = home;
    }
    Ok(config)
}

/// Print validation findings. Returns whether the configuration is usable.
fn validate(config: &Config) -> bool {
    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        warn!("{}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        eprintln!("error: {}: {}", error.path, error.message);
    }
    result.is_valid()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref(), cli.home)?;
    init_tracing(&config.logging)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            if !validate(&config) {
                anyhow::bail!("Invalid configuration");
            }
            cmd_run::run(config).await
        }
        Commands::Validate => {
            if !validate(&config) {
                anyhow::bail!("Invalid configuration");
            }
            info!("Configuration is valid");
            println!("Configuration OK (home: {})", config.home().display());
            Ok(())
        }
        Commands::Resolve {
            artifact,
            class,
            resource,
            kind,
        } => {
            let lookup = match (class, resource) {
                (Some(class), _) => Lookup::Class(class),
                (None, Some(resource)) => Lookup::Resource(resource),
                (None, None) => anyhow::bail!("Either --class or --resource is required"),
            };
            cmd_resolve::resolve(&config, &artifact, kind.into(), lookup).await
        }
    }
}
