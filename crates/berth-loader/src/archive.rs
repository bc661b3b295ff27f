//! Packaged artifact format.
//!
//! Artifacts, shared libraries and plugins may be shipped as gzip-compressed tar
//! archives (`.tar.gz` or `.tgz`). Entry paths are relative to the archive root.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{Archive, Builder};
use tracing::debug;
use walkdir::WalkDir;

/// Recognized archive suffixes.
pub const ARCHIVE_SUFFIXES: [&str; 2] = [".tar.gz", ".tgz"];

/// Whether a path names a packaged archive.
pub fn is_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| ARCHIVE_SUFFIXES.iter().any(|s| name.ends_with(s)))
}

/// Artifact name of an archive, its file name without the suffix.
pub fn archive_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Explode an archive into `dest`, creating it if needed.
pub fn unpack(archive: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest)?;
    let file = File::open(archive)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.unpack(dest)?;
    debug!("Unpacked archive into {}", dest.display());
    Ok(())
}

/// Pack the contents of `dir` into a `.tar.gz` at `dest`.
///
/// Entries are added in sorted order so equal inputs give equal archives.
pub fn pack_directory(dir: &Path, dest: &Path) -> std::io::Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(dest)?);
    let encoder = GzEncoder::new(writer, Compression::default());
    let mut tar = Builder::new(encoder);

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(std::io::Error::other)?;
        let mut file = File::open(entry.path())?;
        tar.append_file(relative, &mut file)?;
    }

    let mut writer = tar.into_inner()?.finish()?;
    writer.flush()?;
    debug!("Packed {} into {}", dir.display(), dest.display());
    Ok(dest.to_path_buf())
}
