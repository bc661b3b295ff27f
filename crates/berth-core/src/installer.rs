//! Exploding packaged artifacts into their deployment directories.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use berth_loader::archive::{archive_name, is_archive, unpack};

#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveInstaller;

impl ArchiveInstaller {
    pub fn new() -> Self {
        Self
    }

    /// Explode `archive` into `<dir>/<name>/` and delete the archive.
    ///
    /// The archive is unpacked into a hidden staging directory first, so a
    /// corrupt archive never replaces an existing installation.
    pub fn install(&self, archive: &Path) -> io::Result<PathBuf> {
        let name = archive_name(archive).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not an artifact archive: {}", archive.display()),
            )
        })?;
        let dir = archive.parent().unwrap_or_else(|| Path::new("."));
        let staging = dir.join(format!(".{name}{INSTALLING_SUFFIX}"));
        let target = dir.join(&name);

        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        if let Err(e) = unpack(archive, &staging) {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                debug!("Could not remove staging dir {}: {}", staging.display(), cleanup);
            }
            return Err(e);
        }

        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        fs::rename(&staging, &target)?;
        fs::remove_file(archive)?;

        info!("Installed {} into {}", archive.display(), target.display());
        Ok(target)
    }

    /// Remove an exploded artifact directory.
    pub fn uninstall(&self, dir: &Path) -> io::Result<()> {
        if dir.is_dir() {
            fs::remove_dir_all(dir)?;
            info!("Uninstalled {}", dir.display());
        }
        Ok(())
    }

    /// Prepare an external archive or directory for deployment into `kind_dir`.
    ///
    /// Sources already inside `kind_dir` stay in place. Anything else is
    /// copied into a hidden staging entry next to its final location; the
    /// current target is only replaced by [`commit`](Self::commit).
    pub fn stage(&self, source: &Path, kind_dir: &Path) -> io::Result<StagedSource> {
        let file_name = source.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot stage {}", source.display()),
            )
        })?;
        fs::create_dir_all(kind_dir)?;
        let target = kind_dir.join(file_name);

        if canonical_parent(source)? == fs::canonicalize(kind_dir)? {
            return Ok(StagedSource::InPlace(target));
        }

        let mut staging_name = OsString::from(".");
        staging_name.push(file_name);
        staging_name.push(STAGING_SUFFIX);
        let staging = kind_dir.join(staging_name);
        remove_entry(&staging)?;

        let copied = if source.is_dir() {
            copy_dir(source, &staging)
        } else if is_archive(source) {
            fs::copy(source, &staging).map(drop)
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a directory or archive: {}", source.display()),
            ));
        };
        if let Err(e) = copied {
            if let Err(cleanup) = remove_entry(&staging) {
                debug!("Could not remove staging entry {}: {}", staging.display(), cleanup);
            }
            return Err(e);
        }

        debug!("Staged {} as {}", source.display(), staging.display());
        Ok(StagedSource::Copied { staging, target })
    }

    /// Move a staged source to its final location, replacing what is there.
    pub fn commit(&self, staged: StagedSource) -> io::Result<PathBuf> {
        match staged {
            StagedSource::InPlace(target) => Ok(target),
            StagedSource::Copied { staging, target } => {
                let moved = remove_entry(&target).and_then(|()| fs::rename(&staging, &target));
                if let Err(e) = moved {
                    if let Err(cleanup) = remove_entry(&staging) {
                        debug!("Could not remove staging entry {}: {}", staging.display(), cleanup);
                    }
                    return Err(e);
                }
                debug!("Moved {} to {}", staging.display(), target.display());
                Ok(target)
            }
        }
    }

    /// Drop a staged copy without touching the target.
    pub fn discard(&self, staged: StagedSource) -> io::Result<()> {
        match staged {
            StagedSource::InPlace(_) => Ok(()),
            StagedSource::Copied { staging, .. } => remove_entry(&staging),
        }
    }
}

/// Suffix of the hidden entries [`ArchiveInstaller::stage`] copies into.
pub const STAGING_SUFFIX: &str = ".staging";

/// Suffix of the hidden directories archives are unpacked into.
pub const INSTALLING_SUFFIX: &str = ".installing";

/// A source prepared by [`ArchiveInstaller::stage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedSource {
    /// Already in the deployment directory.
    InPlace(PathBuf),
    /// Copied into `staging`, waiting to replace `target`.
    Copied { staging: PathBuf, target: PathBuf },
}

impl StagedSource {
    /// Where the source lives once committed.
    pub fn target(&self) -> &Path {
        match self {
            Self::InPlace(target) => target,
            Self::Copied { target, .. } => target,
        }
    }
}

/// Artifact name of a source: the archive name without its suffix, or the
/// directory name.
pub fn artifact_name(source: &Path) -> Option<String> {
    if is_archive(source) {
        archive_name(source)
    } else {
        source.file_name()?.to_str().map(str::to_string)
    }
}

fn canonical_parent(path: &Path) -> io::Result<PathBuf> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::canonicalize(parent),
        _ => fs::canonicalize("."),
    }
}

/// Remove a file, symlink or directory tree if present.
fn remove_entry(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        } else {
            warn!("Skipping special file {}", entry.path().display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write;
    use berth_loader::archive::pack_directory;
    use tempfile::TempDir;

    #[test]
    fn test_install_explodes_and_removes_archive() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src, "classes/orders.xml", "<flow/>");
        let apps = temp.path().join("apps");
        fs::create_dir_all(&apps).unwrap();
        let archive = pack_directory(&src, &apps.join("orders-app.tar.gz")).unwrap();

        let target = ArchiveInstaller::new().install(&archive).unwrap();
        assert_eq!(target, apps.join("orders-app"));
        assert_eq!(
            fs::read_to_string(target.join("classes/orders.xml")).unwrap(),
            "<flow/>"
        );
        assert!(!archive.exists());
        assert!(!apps.join(".orders-app.installing").exists());
    }

    #[test]
    fn test_install_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let apps = temp.path().join("apps");
        write(&apps, "orders-app/stale.txt", "old");
        let src = temp.path().join("src");
        write(&src, "fresh.txt", "new");
        let archive = pack_directory(&src, &apps.join("orders-app.tgz")).unwrap();

        let target = ArchiveInstaller::new().install(&archive).unwrap();
        assert!(target.join("fresh.txt").is_file());
        assert!(!target.join("stale.txt").exists());
    }

    #[test]
    fn test_corrupt_archive_keeps_existing() {
        let temp = TempDir::new().unwrap();
        let apps = temp.path().join("apps");
        write(&apps, "broken/keep.txt", "keep");
        write(&apps, "broken.tar.gz", "definitely not gzip");

        let result = ArchiveInstaller::new().install(&apps.join("broken.tar.gz"));
        assert!(result.is_err());
        assert!(apps.join("broken/keep.txt").is_file());
        assert!(apps.join("broken.tar.gz").is_file());
        assert!(!apps.join(".broken.installing").exists());
    }

    #[test]
    fn test_stage_commit_and_uninstall() {
        let temp = TempDir::new().unwrap();
        let external = temp.path().join("external/orders-app");
        write(&external, "classes/a.txt", "a");
        let apps = temp.path().join("apps");
        write(&apps, "orders-app/classes/old.txt", "old");

        let installer = ArchiveInstaller::new();
        let staged = installer.stage(&external, &apps).unwrap();
        assert_eq!(staged.target(), apps.join("orders-app"));
        assert!(matches!(&staged, StagedSource::Copied { staging, .. } if staging.join("classes/a.txt").is_file()));
        assert!(apps.join("orders-app/classes/old.txt").is_file());

        let target = installer.commit(staged).unwrap();
        assert_eq!(target, apps.join("orders-app"));
        assert!(target.join("classes/a.txt").is_file());
        assert!(!target.join("classes/old.txt").exists());
        assert!(!apps.join(".orders-app.staging").exists());

        installer.uninstall(&target).unwrap();
        assert!(!target.exists());
        installer.uninstall(&target).unwrap();
    }

    #[test]
    fn test_stage_inside_kind_dir_stays_in_place() {
        let temp = TempDir::new().unwrap();
        let apps = temp.path().join("apps");
        write(&apps, "orders-app/classes/a.txt", "a");

        let installer = ArchiveInstaller::new();
        for source in [
            apps.join("orders-app"),
            temp.path().join("apps/../apps/orders-app"),
            apps.join("./orders-app"),
        ] {
            let staged = installer.stage(&source, &apps).unwrap();
            assert_eq!(staged, StagedSource::InPlace(apps.join("orders-app")));
            assert_eq!(installer.commit(staged).unwrap(), apps.join("orders-app"));
        }
        assert!(apps.join("orders-app/classes/a.txt").is_file());
        assert_eq!(fs::read_dir(&apps).unwrap().count(), 1);
    }

    #[test]
    fn test_discard_keeps_target() {
        let temp = TempDir::new().unwrap();
        let external = temp.path().join("external/orders-app");
        write(&external, "fresh.txt", "new");
        let apps = temp.path().join("apps");
        write(&apps, "orders-app/keep.txt", "keep");

        let installer = ArchiveInstaller::new();
        let staged = installer.stage(&external, &apps).unwrap();
        installer.discard(staged).unwrap();
        assert!(apps.join("orders-app/keep.txt").is_file());
        assert!(!apps.join("orders-app/fresh.txt").exists());
        assert!(!apps.join(".orders-app.staging").exists());
    }

    #[test]
    fn test_stage_archive_replaces_on_commit() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src, "fresh.txt", "new");
        let archive = pack_directory(&src, &temp.path().join("orders-app.tar.gz")).unwrap();
        let apps = temp.path().join("apps");

        let installer = ArchiveInstaller::new();
        let staged = installer.stage(&archive, &apps).unwrap();
        assert!(!apps.join("orders-app.tar.gz").exists());
        let target = installer.commit(staged).unwrap();
        assert_eq!(target, apps.join("orders-app.tar.gz"));
        assert!(target.is_file());
        assert!(archive.is_file());
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name(Path::new("/apps/orders-app.tar.gz")).as_deref(), Some("orders-app"));
        assert_eq!(artifact_name(Path::new("/apps/orders-app")).as_deref(), Some("orders-app"));
        assert_eq!(artifact_name(Path::new("/apps/.tgz")), None);
    }

    #[test]
    fn test_stage_rejects_plain_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "notes.md", "x");
        let result = ArchiveInstaller::new().stage(&temp.path().join("notes.md"), &temp.path().join("apps"));
        assert!(result.is_err());
    }
}
