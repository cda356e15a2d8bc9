//! Gzip-compressed tar handling for job archives. Incoming jobs unpack into a
//! directory named after the job; results are packed the same way so the
//! receiving side can unpack them with the same call.
use std::fs::{self, File};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::ArchiveError;

/// Unpacks `archive` into `dest`, creating `dest` when needed.
pub fn extract(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    fs::create_dir_all(dest).map_err(ArchiveError::io(dest))?;
    let file = File::open(archive).map_err(ArchiveError::io(archive))?;
    let mut entries = tar::Archive::new(GzDecoder::new(file));
    entries.unpack(dest).map_err(ArchiveError::io(archive))?;
    debug!(archive = %archive.display(), dest = %dest.display(), "extracted archive");
    Ok(())
}

/// Packs `dir` into `archive`, rooted at the directory's own name.
pub fn package_dir(dir: &Path, archive: &Path) -> Result<(), ArchiveError> {
    if !dir.is_dir() {
        return Err(ArchiveError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }
    let root = dir.file_name().unwrap_or(dir.as_os_str());

    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent).map_err(ArchiveError::io(parent))?;
    }
    let file = File::create(archive).map_err(ArchiveError::io(archive))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder
        .append_dir_all(root, dir)
        .map_err(ArchiveError::io(dir))?;
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(ArchiveError::io(archive))?;

    debug!(dir = %dir.display(), archive = %archive.display(), "packaged directory");
    Ok(())
}
