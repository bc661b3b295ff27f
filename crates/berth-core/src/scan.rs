//! Directory snapshots and the differences between two scans.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

use berth_loader::archive::archive_name;

use crate::anchor::is_anchor;
use crate::artifact::SourceFingerprint;

/// Deployable sources of one kind directory, keyed by artifact name.
///
/// When both `name/` and `name.tar.gz` exist, the archive is the source: it is
/// about to replace the exploded directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    entries: BTreeMap<String, SourceFingerprint>,
}

impl DirectorySnapshot {
    pub fn take(dir: &Path) -> io::Result<Self> {
        let mut entries = BTreeMap::new();
        if !dir.is_dir() {
            return Ok(Self { entries });
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with('.') || is_anchor(&path) {
                continue;
            }

            let (name, archive) = if path.is_dir() {
                (file_name.to_string(), false)
            } else if let Some(name) = archive_name(&path) {
                (name, true)
            } else {
                trace!("Ignoring {}", path.display());
                continue;
            };

            if !archive && entries.contains_key(&name) {
                continue;
            }
            // Removed between listing and stat; the next scan sees the outcome.
            let Ok(fingerprint) = SourceFingerprint::of(&path) else {
                continue;
            };
            entries.insert(name, fingerprint);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&SourceFingerprint> {
        self.entries.get(name)
    }

    /// Source path of `name`, if present.
    pub fn source(&self, name: &str) -> Option<&PathBuf> {
        self.entries.get(name).map(|f| &f.path)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceFingerprint)> {
        self.entries.iter().map(|(name, f)| (name.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names added, removed and modified since `previous`, each sorted.
    pub fn delta(&self, previous: &DirectorySnapshot) -> ScanDelta {
        let mut delta = ScanDelta::default();
        for (name, fingerprint) in &self.entries {
            match previous.entries.get(name) {
                None => delta.added.push(name.clone()),
                Some(old) if old != fingerprint => delta.modified.push(name.clone()),
                Some(_) => {}
            }
        }
        delta.removed = previous
            .entries
            .keys()
            .filter(|name| !self.entries.contains_key(*name))
            .cloned()
            .collect();
        delta
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl ScanDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.added.iter().chain(&self.modified).any(|n| n == name)
    }
}

/// What one scan did, by artifact name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub deployed: Vec<String>,
    pub redeployed: Vec<String>,
    pub undeployed: Vec<String>,
    pub failed: Vec<String>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.deployed.is_empty()
            && self.redeployed.is_empty()
            && self.undeployed.is_empty()
            && self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(path: &Path, secs: u64) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_snapshot_entries() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "orders-app/classes/a.txt", "a");
        write(temp.path(), "billing.tar.gz", "x");
        write(temp.path(), "orders-app-anchor.txt", "");
        write(temp.path(), ".orders.installing/x", "");
        write(temp.path(), "readme.md", "");

        let snapshot = DirectorySnapshot::take(temp.path()).unwrap();
        assert_eq!(snapshot.names().collect::<Vec<_>>(), vec!["billing", "orders-app"]);
        assert_eq!(
            snapshot.source("billing"),
            Some(&temp.path().join("billing.tar.gz"))
        );
    }

    #[test]
    fn test_archive_wins_over_directory() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "orders-app/artifact.toml", "");
        write(temp.path(), "orders-app.tgz", "x");

        let snapshot = DirectorySnapshot::take(temp.path()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.source("orders-app"),
            Some(&temp.path().join("orders-app.tgz"))
        );
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(DirectorySnapshot::take(&temp.path().join("apps")).unwrap().is_empty());
    }

    #[test]
    fn test_delta() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "kept/artifact.toml", "");
        write(temp.path(), "touched/artifact.toml", "");
        write(temp.path(), "gone/artifact.toml", "");
        touch(&temp.path().join("touched/artifact.toml"), 100);
        let before = DirectorySnapshot::take(temp.path()).unwrap();

        fs::remove_dir_all(temp.path().join("gone")).unwrap();
        write(temp.path(), "fresh.tar.gz", "x");
        touch(&temp.path().join("touched/artifact.toml"), 200);
        let after = DirectorySnapshot::take(temp.path()).unwrap();

        let delta = after.delta(&before);
        assert_eq!(delta.added, vec!["fresh".to_string()]);
        assert_eq!(delta.removed, vec!["gone".to_string()]);
        assert_eq!(delta.modified, vec!["touched".to_string()]);
        assert!(delta.is_changed("fresh"));
        assert!(!delta.is_changed("kept"));
        assert!(after.delta(&after).is_empty());
    }
}
