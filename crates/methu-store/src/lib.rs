//! Local frame store: presence checks, listing, and staged publication.
//!
//! A frame counts as present only when its file exists and is non-empty, so
//! a zero-length leftover from an aborted write is fetched again on the next
//! pass. Writers stage into hidden (`.`-prefixed) siblings and rename into
//! place; listings never report hidden entries.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use methu_types::{naming::FrameIdentifier, MethuError, Result};
use tracing::debug;

pub const FRAME_STAGING_SUFFIX: &str = "part";
pub const ARTIFACT_STAGING_SUFFIX: &str = "tmp";

/// Directory of downloaded frames keyed by identifier.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &FrameIdentifier) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn staging_path_for(&self, id: &FrameIdentifier) -> PathBuf {
        staging_path(&self.path_for(id), FRAME_STAGING_SUFFIX)
    }

    pub fn is_present(&self, id: &FrameIdentifier) -> bool {
        is_frame_present(&self.path_for(id))
    }

    /// Candidates without a usable local copy, in their original order.
    pub fn missing(&self, candidates: &[FrameIdentifier]) -> Vec<FrameIdentifier> {
        candidates
            .iter()
            .filter(|id| {
                let present = self.is_present(id);
                if present {
                    debug!("{} already stored, skipping", id);
                }
                !present
            })
            .cloned()
            .collect()
    }

    pub fn list_frames(&self) -> Result<Vec<PathBuf>> {
        list_image_files(&self.root)
    }
}

/// True when `path` is a regular file with at least one byte.
pub fn is_frame_present(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Regular, non-hidden files of `dir`, sorted by file name.
pub fn list_image_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|err| {
        MethuError::Store(format!("unable to list {}: {err}", dir.display()))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            MethuError::Store(format!("unable to read entry in {}: {err}", dir.display()))
        })?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        match entry.file_type() {
            Ok(kind) if kind.is_file() => files.push(entry.path()),
            _ => continue,
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Hidden sibling of `dest` used while its content is being written.
pub fn staging_path(dest: &Path, suffix: &str) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.{suffix}"))
}

/// Atomically replace `dest` with the fully written `staged` file.
///
/// The staged file is removed when the rename fails so it cannot linger.
pub fn commit_staged(staged: &Path, dest: &Path) -> io::Result<()> {
    fs::rename(staged, dest).inspect_err(|_| {
        let _ = fs::remove_file(staged);
    })
}
