use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use jobconfig::Selection;
use tracing::{debug, warn};

/// Extensions tried, in order, when an identifier names an image.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub id: String,
    pub path: PathBuf,
}

/// Expands a selection into image files below `dir`.
pub fn resolve_selection(selection: &Selection, dir: &Path) -> Result<Vec<ImageRef>> {
    match selection {
        Selection::All => list_images(dir),
        Selection::Named(ids) => ids.iter().map(|id| resolve_image(dir, id)).collect(),
    }
}

fn list_images(dir: &Path) -> Result<Vec<ImageRef>> {
    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to list images in {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to list images in {}", dir.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if !path.is_file() || !has_image_extension(&path) {
            continue;
        }
        let Some(id) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Some(existing) = found.get(&id) {
            warn!(
                id = %id,
                kept = %existing.display(),
                ignored = %path.display(),
                "multiple images share an identifier"
            );
            continue;
        }
        found.insert(id, path);
    }

    if found.is_empty() {
        bail!("wildcard matched no images in {}", dir.display());
    }
    debug!(dir = %dir.display(), images = found.len(), "expanded wildcard selection");

    Ok(found
        .into_iter()
        .map(|(id, path)| ImageRef { id, path })
        .collect())
}

fn resolve_image(dir: &Path, id: &str) -> Result<ImageRef> {
    for ext in IMAGE_EXTENSIONS {
        let candidate = dir.join(format!("{id}.{ext}"));
        if candidate.is_file() {
            return Ok(ImageRef {
                id: id.to_string(),
                path: candidate,
            });
        }
    }

    let direct = dir.join(id);
    if direct.is_file() && has_image_extension(&direct) {
        if let Some(stem) = direct.file_stem() {
            return Ok(ImageRef {
                id: stem.to_string_lossy().into_owned(),
                path: direct,
            });
        }
    }

    bail!("image '{id}' not found in {}", dir.display())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
