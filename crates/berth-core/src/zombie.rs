//! Bookkeeping of artifacts whose last deployment failed.
//!
//! A zombie is keyed by artifact name and remembers the exact source it failed
//! on. Scans skip that source until its modification time changes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use parking_lot::RwLock;
use tracing::debug;

use crate::artifact::{ArtifactState, SourceFingerprint};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZombieEntry {
    pub source: PathBuf,
    pub last_modified: SystemTime,
    pub last_state: ArtifactState,
    pub error: String,
}

impl ZombieEntry {
    pub fn matches(&self, fingerprint: &SourceFingerprint) -> bool {
        self.source == fingerprint.path && self.last_modified == fingerprint.last_modified
    }
}

#[derive(Debug, Default)]
pub struct ZombieTracker {
    entries: RwLock<HashMap<String, ZombieEntry>>,
}

impl ZombieTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed deployment, replacing any earlier entry for the name.
    pub fn record(
        &self,
        name: impl Into<String>,
        fingerprint: &SourceFingerprint,
        last_state: ArtifactState,
        error: impl ToString,
    ) {
        let name = name.into();
        debug!("Recording zombie {} at {}", name, fingerprint.path.display());
        self.entries.write().insert(
            name,
            ZombieEntry {
                source: fingerprint.path.clone(),
                last_modified: fingerprint.last_modified,
                last_state,
                error: error.to_string(),
            },
        );
    }

    /// Whether `fingerprint` is exactly the source that already failed.
    pub fn is_zombie(&self, name: &str, fingerprint: &SourceFingerprint) -> bool {
        self.entries
            .read()
            .get(name)
            .is_some_and(|entry| entry.matches(fingerprint))
    }

    pub fn clear(&self, name: &str) -> Option<ZombieEntry> {
        self.entries.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<ZombieEntry> {
        self.entries.read().get(name).cloned()
    }

    /// Current entries sorted by name.
    pub fn entries(&self) -> Vec<(String, ZombieEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
