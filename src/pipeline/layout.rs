// src/pipeline/layout.rs

//! On-disk layout of a repackaging run

use crate::overlay::Overlay;
use std::path::{Path, PathBuf};

/// Paths of every artifact the pipeline reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLayout {
    root: PathBuf,
}

impl WorkLayout {
    /// Layout rooted at the run's work directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Work directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Merged single APK
    pub fn merged_apk(&self) -> PathBuf {
        self.root.join("merged.apk")
    }

    /// Decompiled working tree
    pub fn decompiled(&self) -> PathBuf {
        self.root.join("decompiled")
    }

    /// Pristine snapshots mirroring the working tree
    pub fn backup(&self) -> PathBuf {
        self.root.join("backup")
    }

    /// Rebuilt, not yet signed APK
    pub fn unsigned_apk(&self) -> PathBuf {
        self.root.join("unsigned.apk")
    }

    /// Final signed APK
    pub fn signed_apk(&self) -> PathBuf {
        self.root.join("modified.apk")
    }

    /// Where a stage writes before renaming its output into place
    ///
    /// `merged.apk` stages as `merged.partial.apk`, `decompiled` as
    /// `decompiled.partial`.
    pub fn staging(&self, artifact: &Path) -> PathBuf {
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match artifact.extension() {
            Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
            None => format!("{}.partial", stem),
        };
        artifact.with_file_name(name)
    }

    /// Overlay over the decompiled tree and its backups
    pub fn overlay(&self) -> Overlay {
        Overlay::new(self.decompiled(), self.backup())
    }
}
