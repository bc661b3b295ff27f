//! Anchor files.
//!
//! Each successfully deployed artifact gets `<name>-anchor.txt` next to it.
//! Deleting the anchor asks for the artifact to be undeployed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

pub const ANCHOR_SUFFIX: &str = "-anchor.txt";

pub fn anchor_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}{ANCHOR_SUFFIX}"))
}

pub fn is_anchor(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(ANCHOR_SUFFIX))
}

pub fn write_anchor(dir: &Path, name: &str) -> io::Result<PathBuf> {
    let path = anchor_path(dir, name);
    fs::write(&path, format!("Delete this file while the host is running to undeploy {name}\n"))?;
    Ok(path)
}

/// Remove the anchor of `name`. A missing anchor is not an error.
pub fn remove_anchor(dir: &Path, name: &str) -> io::Result<()> {
    match fs::remove_file(anchor_path(dir, name)) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

pub fn has_anchor(dir: &Path, name: &str) -> bool {
    anchor_path(dir, name).is_file()
}

/// Delete every anchor in `dir`, returning how many were removed.
pub fn clear_anchors(dir: &Path) -> io::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_anchor(&path) {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("Cleared {} leftover anchors in {}", removed, dir.display());
    }
    Ok(removed)
}
