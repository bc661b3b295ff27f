//! Byte sources backing loading units.
//!
//! A byte source is one directory or one archive. Units walk their sources in
//! order; the first source holding a path wins.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use flate2::read::GzDecoder;
use parking_lot::RwLock;
use tar::Archive;
use tracing::{debug, trace};
use walkdir::WalkDir;

use berth_protocols::{LoadError, package_of};

use crate::archive::is_archive;

/// Top-level directory never treated as a code package.
const META_INF: &str = "META-INF";

/// One opened location of code and resources.
pub trait ByteSource: Send + Sync {
    /// Where the bytes come from.
    fn location(&self) -> &str;

    /// Read an entry, `Ok(None)` when the source does not hold it.
    fn read(&self, path: &str) -> Result<Option<Bytes>, LoadError>;

    /// Packages holding at least one entry, `META-INF` excluded.
    fn packages(&self) -> Result<BTreeSet<String>, LoadError>;

    /// Release the source. Later reads fail with [`LoadError::SourceClosed`].
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Open a directory or archive as a byte source.
pub fn open_source(path: &Path) -> Result<Box<dyn ByteSource>, LoadError> {
    if path.is_dir() {
        Ok(Box::new(DirectorySource::new(path)))
    } else if path.is_file() && is_archive(path) {
        Ok(Box::new(ArchiveSource::open(path)?))
    } else if path.exists() {
        Err(LoadError::OpenFailed {
            location: path.display().to_string(),
            message: "unsupported source type".to_string(),
        })
    } else {
        Err(LoadError::OpenFailed {
            location: path.display().to_string(),
            message: "no such file or directory".to_string(),
        })
    }
}

/// Validate and normalize an entry path to `a/b/c` form.
fn normalize(path: &str) -> Result<String, LoadError> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(LoadError::InvalidName(path.to_string()));
    }
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(LoadError::InvalidName(path.to_string())),
        }
    }
    Ok(trimmed
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/"))
}

fn is_code_package(package: &str) -> bool {
    !package.is_empty() && package != META_INF && !package.starts_with("META-INF.")
}

/// A plain directory.
pub struct DirectorySource {
    root: PathBuf,
    location: String,
    closed: AtomicBool,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let location = root.display().to_string();
        Self {
            root,
            location,
            closed: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_open(&self) -> Result<(), LoadError> {
        if self.is_closed() {
            return Err(LoadError::SourceClosed(self.location.clone()));
        }
        Ok(())
    }
}

impl ByteSource for DirectorySource {
    fn location(&self) -> &str {
        &self.location
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, LoadError> {
        self.ensure_open()?;
        let relative = normalize(path)?;
        let full = self.root.join(&relative);
        if !full.is_file() {
            return Ok(None);
        }
        let data = std::fs::read(&full)?;
        trace!("Read {} from {}", relative, self.location);
        Ok(Some(Bytes::from(data)))
    }

    fn packages(&self) -> Result<BTreeSet<String>, LoadError> {
        self.ensure_open()?;
        let mut packages = BTreeSet::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            let package = package_of(&relative);
            if is_code_package(&package) {
                packages.insert(package);
            }
        }
        Ok(packages)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed directory source {}", self.location);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A `.tar.gz` archive, indexed into memory when opened.
pub struct ArchiveSource {
    location: String,
    entries: RwLock<Option<HashMap<String, Bytes>>>,
}

impl ArchiveSource {
    /// Open and index an archive.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let location = path.display().to_string();
        let open_failed = |message: String| LoadError::OpenFailed {
            location: location.clone(),
            message,
        };

        let file = File::open(path).map_err(|e| open_failed(e.to_string()))?;
        let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
        let mut entries = HashMap::new();

        for entry in archive.entries().map_err(|e| open_failed(e.to_string()))? {
            let mut entry = entry.map_err(|e| open_failed(e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let raw = entry
                .path()
                .map_err(|e| open_failed(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            let name = normalize(&raw).map_err(|_| open_failed(format!("invalid entry {raw}")))?;
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| open_failed(e.to_string()))?;
            entries.insert(name, Bytes::from(data));
        }

        debug!("Indexed {} entries from {}", entries.len(), location);
        Ok(Self {
            location,
            entries: RwLock::new(Some(entries)),
        })
    }

    /// Number of indexed entries, zero once closed.
    pub fn len(&self) -> usize {
        self.entries.read().as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for ArchiveSource {
    fn location(&self) -> &str {
        &self.location
    }

    fn read(&self, path: &str) -> Result<Option<Bytes>, LoadError> {
        let relative = normalize(path)?;
        let guard = self.entries.read();
        let entries = guard
            .as_ref()
            .ok_or_else(|| LoadError::SourceClosed(self.location.clone()))?;
        Ok(entries.get(&relative).cloned())
    }

    fn packages(&self) -> Result<BTreeSet<String>, LoadError> {
        let guard = self.entries.read();
        let entries = guard
            .as_ref()
            .ok_or_else(|| LoadError::SourceClosed(self.location.clone()))?;
        Ok(entries
            .keys()
            .map(|name| package_of(name))
            .filter(|package| is_code_package(package))
            .collect())
    }

    fn close(&self) {
        if self.entries.write().take().is_some() {
            debug!("Closed archive source {}", self.location);
        }
    }

    fn is_closed(&self) -> bool {
        self.entries.read().is_none()
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
