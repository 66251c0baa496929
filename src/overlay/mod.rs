// src/overlay/mod.rs

//! Backup overlay: pristine copies beside a mutable working tree
//!
//! Every resource has two on-disk representations. The working copy lives
//! under the working root and is the only thing downstream tools read. The
//! pristine copy lives at the same relative path under the backup root and
//! is written exactly once, the first time any patcher changes the resource.
//!
//! Patchers only ever see two operations:
//!
//! - [`Overlay::read_baseline`]: the pristine content, which is the working
//!   content for a resource nobody has touched yet
//! - [`Overlay::ensure_snapshotted`]: preserve the current working content
//!   as pristine, unless a snapshot already exists
//!
//! Because the baseline never moves, rules are always evaluated against the
//! original content and re-running a patch cannot compound.

pub mod path;

use crate::error::{Error, Result};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use path::{relative_resource, resource_join};

/// Pristine/working overlay over a decompiled tree
#[derive(Debug, Clone)]
pub struct Overlay {
    /// Working tree, mutated in place
    working_root: PathBuf,
    /// Mirror of the working tree holding first-touch snapshots
    backup_root: PathBuf,
}

impl Overlay {
    /// Create an overlay. Neither directory has to exist yet; the backup
    /// root is created lazily on the first snapshot.
    pub fn new(working_root: impl AsRef<Path>, backup_root: impl AsRef<Path>) -> Self {
        Self {
            working_root: working_root.as_ref().to_path_buf(),
            backup_root: backup_root.as_ref().to_path_buf(),
        }
    }

    /// Root of the working tree
    pub fn working_root(&self) -> &Path {
        &self.working_root
    }

    /// Root of the backup mirror
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Location of the working copy of a resource
    pub fn working_path(&self, resource: impl AsRef<Path>) -> Result<PathBuf> {
        resource_join(&self.working_root, resource)
    }

    /// Location a snapshot of the resource would occupy
    pub fn backup_path(&self, resource: impl AsRef<Path>) -> Result<PathBuf> {
        resource_join(&self.backup_root, resource)
    }

    /// Whether a pristine snapshot of the resource exists
    pub fn has_snapshot(&self, resource: impl AsRef<Path>) -> Result<bool> {
        Ok(self.backup_path(resource)?.is_file())
    }

    /// Path holding the pristine content of a resource
    ///
    /// The snapshot if one exists, otherwise the working copy, which is
    /// pristine by definition when nothing has snapshotted it.
    pub fn baseline_path(&self, resource: impl AsRef<Path>) -> Result<PathBuf> {
        let resource = resource.as_ref();
        let backup = self.backup_path(resource)?;
        if backup.is_file() {
            Ok(backup)
        } else {
            self.working_path(resource)
        }
    }

    /// Read the pristine content of a resource
    pub fn read_baseline(&self, resource: impl AsRef<Path>) -> Result<Vec<u8>> {
        let resource = resource.as_ref();
        let path = self.baseline_path(resource)?;
        if !path.is_file() {
            return Err(Error::MissingResource(format!(
                "{} (looked in {})",
                resource.display(),
                self.working_root.display()
            )));
        }
        fs::read(&path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", path.display())))
    }

    /// Read the pristine content of a resource as UTF-8 text
    pub fn read_baseline_text(&self, resource: impl AsRef<Path>) -> Result<String> {
        let resource = resource.as_ref();
        let bytes = self.read_baseline(resource)?;
        String::from_utf8(bytes).map_err(|e| {
            Error::IoError(format!(
                "{} is not valid UTF-8: {e}",
                resource.display()
            ))
        })
    }

    /// Snapshot the current working content as pristine, once
    ///
    /// Returns `true` if a snapshot was created by this call. The copy goes
    /// through a temporary sibling and a rename, so an interrupted run can
    /// never leave a truncated file that later passes for pristine.
    pub fn ensure_snapshotted(&self, resource: impl AsRef<Path>) -> Result<bool> {
        let resource = resource.as_ref();
        let backup = self.backup_path(resource)?;
        if backup.is_file() {
            return Ok(false);
        }

        let working = self.working_path(resource)?;
        if !working.is_file() {
            return Err(Error::MissingResource(working.display().to_string()));
        }

        if let Some(parent) = backup.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        let temp = snapshot_temp_path(&backup);
        copy_preserving_metadata(&working, &temp)?;
        fs::rename(&temp, &backup).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {e}",
                temp.display(),
                backup.display()
            ))
        })?;

        debug!("Snapshotted {} to {}", working.display(), backup.display());
        Ok(true)
    }

    /// Copy a snapshot back over the working copy
    ///
    /// Returns `false` when the resource was never snapshotted, meaning the
    /// working copy is already pristine. The snapshot itself is kept.
    pub fn restore(&self, resource: impl AsRef<Path>) -> Result<bool> {
        let resource = resource.as_ref();
        let backup = self.backup_path(resource)?;
        if !backup.is_file() {
            return Ok(false);
        }
        let working = self.working_path(resource)?;
        if let Some(parent) = working.parent() {
            fs::create_dir_all(parent)?;
        }
        copy_preserving_metadata(&backup, &working)?;
        info!("Restored {}", working.display());
        Ok(true)
    }

    /// Every resource that has a pristine snapshot, sorted
    pub fn snapshots(&self) -> Result<Vec<PathBuf>> {
        if !self.backup_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut resources = Vec::new();
        for entry in WalkDir::new(&self.backup_root).sort_by_file_name() {
            let entry = entry
                .map_err(|e| Error::IoError(format!("Failed to walk backup tree: {e}")))?;
            if !entry.file_type().is_file() || is_snapshot_temp(entry.path()) {
                continue;
            }
            resources.push(relative_resource(&self.backup_root, entry.path())?);
        }
        Ok(resources)
    }

    /// Restore every snapshotted resource, returning how many were restored
    pub fn restore_all(&self) -> Result<usize> {
        let mut restored = 0;
        for resource in self.snapshots()? {
            if self.restore(&resource)? {
                restored += 1;
            }
        }
        Ok(restored)
    }
}

const SNAPSHOT_TEMP_SUFFIX: &str = ".snapshot-tmp";

fn snapshot_temp_path(backup: &Path) -> PathBuf {
    let mut name = backup.as_os_str().to_os_string();
    name.push(SNAPSHOT_TEMP_SUFFIX);
    PathBuf::from(name)
}

fn is_snapshot_temp(path: &Path) -> bool {
    path.to_string_lossy().ends_with(SNAPSHOT_TEMP_SUFFIX)
}

/// Copy a file keeping its permissions and timestamps
pub(crate) fn copy_preserving_metadata(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(|e| {
        Error::IoError(format!(
            "Failed to copy {} to {}: {e}",
            from.display(),
            to.display()
        ))
    })?;
    let metadata = fs::metadata(from)?;
    filetime::set_file_times(
        to,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )?;
    Ok(())
}
