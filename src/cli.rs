//! CLI definitions for Berth.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use berth_protocols::ArtifactKind;

/// Berth CLI.
#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Artifact isolation and deployment host")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BERTH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Container home, overrides `container.home`
    #[arg(long, env = "BERTH_HOME", global = true)]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the deployment host in foreground (default)
    Run,

    /// Validate the configuration and exit
    Validate,

    /// Build an artifact's loading hierarchy and resolve one name through it
    Resolve {
        /// Exploded artifact directory
        artifact: PathBuf,

        /// Dotted class name to resolve
        #[arg(long, conflicts_with = "resource", required_unless_present = "resource")]
        class: Option<String>,

        /// Resource path to resolve
        #[arg(long)]
        resource: Option<String>,

        /// Artifact kind
        #[arg(long, value_enum, default_value_t = KindArg::Application)]
        kind: KindArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum KindArg {
    Domain,
    Application,
}

impl From<KindArg> for ArtifactKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Domain => ArtifactKind::Domain,
            KindArg::Application => ArtifactKind::Application,
        }
    }
}
