//! Time-bucketed directory layout under a tier root.
//!
//! Content files live at `<root>/YYYY-MM-DD[/HH[/MM]]/<id>`, with the
//! depth picked by [`Resolution`]. Path components are sliced from the
//! encoded timestamp so the file tree and the index's timestamp column
//! can never disagree.

use crate::config::Resolution;
use isto_timefmt::{DATE_RANGE, HOUR_RANGE, MINUTE_RANGE};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory for an item with the given encoded timestamp.
pub(crate) fn directory_for(root: &Path, encoded: &str, resolution: Resolution) -> PathBuf {
    let mut dir = root.join(&encoded[DATE_RANGE]);
    if matches!(resolution, Resolution::Hours | Resolution::Minutes) {
        dir.push(&encoded[HOUR_RANGE]);
    }
    if matches!(resolution, Resolution::Minutes) {
        dir.push(&encoded[MINUTE_RANGE]);
    }
    dir
}

/// Full content file path for an item.
pub(crate) fn file_path(root: &Path, encoded: &str, resolution: Resolution, id: &str) -> PathBuf {
    directory_for(root, encoded, resolution).join(id)
}

/// Removes empty directories from `dir` up to (but not including) `root`.
///
/// Called after a content file deletion. Stops at the first directory
/// that is non-empty or outside the tier root.
pub(crate) fn prune_empty_ancestors(dir: &Path, root: &Path) -> io::Result<()> {
    let mut current = dir;
    while current != root && current.starts_with(root) {
        match fs::read_dir(current) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => break,
            Err(err) => return Err(err),
        }
        fs::remove_dir(current)?;
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Ok(())
}
