//! # Berth Loader
//!
//! Isolated loading units and the builder composing them into one artifact's
//! hierarchy: container, shared libraries, plugins, then the artifact itself.

pub mod archive;
pub mod builder;
pub mod plugin;
pub mod source;
pub mod unit;

pub use builder::{ArtifactUnitBuilder, ArtifactUnits};
pub use plugin::{CompositeUnit, PluginUnit, PluginView, build_plugin_view, composite};
pub use source::{ArchiveSource, ByteSource, DirectorySource, open_source};
pub use unit::IsolatedUnit;
