// src/rewrite.rs

//! Structural call-site rewriting across bytecode fragment files
//!
//! A decompiled application carries one fragment file per class, so the
//! set of files to scan grows with the application and is not known in
//! advance. The rewriter applies a single capture-group rule to every file
//! matched by a glob. Almost every file is expected to miss; a rule that
//! misses everywhere is reported, not raised.
//!
//! The companion [`inject_unit`] drops a pre-built implementation unit into
//! the first free numbered slot of the working tree, so rewritten call sites
//! have something to call.

use crate::error::{Error, Result};
use crate::overlay::Overlay;
use crate::overlay::path::{normalize_resource, relative_resource};
use crate::patch::{PatchOutcome, TextPatcher, TextRule};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Summary of one [`StructuralRewriter::rewrite_all`] pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Number of files the glob matched
    pub scanned: usize,
    /// Resources written by this pass
    pub patched: Vec<PathBuf>,
    /// Resources already carrying the rewrite from an earlier run
    pub up_to_date: Vec<PathBuf>,
}

impl RewriteReport {
    /// Number of files in which the rule matched at all
    pub fn matched(&self) -> usize {
        self.patched.len() + self.up_to_date.len()
    }

    /// True when the rule matched nowhere
    pub fn is_miss(&self) -> bool {
        self.matched() == 0
    }
}

/// Applies one pattern rule across every file under a glob
#[derive(Debug, Clone, Copy)]
pub struct StructuralRewriter<'a> {
    overlay: &'a Overlay,
}

impl<'a> StructuralRewriter<'a> {
    /// Create a rewriter over the given overlay
    pub fn new(overlay: &'a Overlay) -> Self {
        Self { overlay }
    }

    /// Rewrite every working-tree file matching `file_glob`
    ///
    /// `file_glob` is relative to the working root, e.g. `smali*/**/*.smali`.
    /// Each file is patched independently through the text patcher, so each
    /// one is idempotent on its own.
    pub fn rewrite_all(&self, file_glob: &str, rule: &TextRule) -> Result<RewriteReport> {
        let patcher = TextPatcher::new(self.overlay);
        let rules = std::slice::from_ref(rule);
        let mut report = RewriteReport::default();

        for resource in glob_resources(self.overlay.working_root(), file_glob)? {
            report.scanned += 1;
            match patcher.apply(&resource, rules)? {
                PatchOutcome::Unchanged => {}
                PatchOutcome::Patched => report.patched.push(resource),
                PatchOutcome::UpToDate => report.up_to_date.push(resource),
            }
        }

        if report.is_miss() {
            info!(
                "Pattern matched none of {} files under {} ({:?})",
                report.scanned, file_glob, rule
            );
        } else {
            info!(
                "Rewrote call sites in {} of {} files ({} already rewritten)",
                report.patched.len(),
                report.scanned,
                report.up_to_date.len()
            );
        }

        Ok(report)
    }
}

/// Resource paths of all files under `root` matching `pattern`, sorted
pub fn glob_resources(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let full = format!("{}/{}", escaped_root.trim_end_matches('/'), pattern);

    let mut resources = Vec::new();
    for entry in glob::glob(&full)? {
        let path = entry.map_err(|e| Error::IoError(format!("Failed to scan {}: {e}", full)))?;
        if path.is_file() {
            resources.push(relative_resource(root, &path)?);
        }
    }
    resources.sort();
    Ok(resources)
}

/// Where an implementation unit ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInjection {
    /// Slot directory name, relative to the working root
    pub slot: PathBuf,
    /// Whether this call copied the unit (false: already present)
    pub copied: bool,
}

/// Numbered slot naming, e.g. `smali_classes2`, `smali_classes3`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotScheme {
    /// Directory name prefix
    pub prefix: String,
    /// First index that may be probed
    pub first_index: usize,
}

impl SlotScheme {
    /// Create a slot scheme
    pub fn new(prefix: impl Into<String>, first_index: usize) -> Self {
        Self {
            prefix: prefix.into(),
            first_index,
        }
    }

    /// Directory name for slot `index`
    pub fn slot_name(&self, index: usize) -> String {
        format!("{}{}", self.prefix, index)
    }

    /// First index whose slot directory does not exist under `root`
    pub fn first_free(&self, root: &Path) -> usize {
        (self.first_index..)
            .find(|i| !root.join(self.slot_name(*i)).exists())
            .unwrap_or(self.first_index)
    }
}

/// Copy `unit_dir` into the first free slot of the working tree
///
/// `marker` is a file inside the unit, relative to the unit root. If the
/// slot just below the first free one already holds the marker, the unit
/// was injected by an earlier run and nothing is copied. The copy is staged
/// beside the working tree and renamed into place, so an interrupted copy
/// never occupies a slot.
pub fn inject_unit(
    working_root: &Path,
    unit_dir: &Path,
    scheme: &SlotScheme,
    marker: impl AsRef<Path>,
) -> Result<SlotInjection> {
    let marker = normalize_resource(marker)?;
    if !unit_dir.join(&marker).is_file() {
        return Err(Error::MissingResource(format!(
            "{} does not contain {}",
            unit_dir.display(),
            marker.display()
        )));
    }

    let free = scheme.first_free(working_root);
    if free > scheme.first_index {
        let previous = PathBuf::from(scheme.slot_name(free - 1));
        if working_root.join(&previous).join(&marker).is_file() {
            info!(
                "{} already present in {}, skipping copy",
                marker.display(),
                previous.display()
            );
            return Ok(SlotInjection {
                slot: previous,
                copied: false,
            });
        }
    }

    let slot = PathBuf::from(scheme.slot_name(free));
    let target = working_root.join(&slot);
    let staging = staging_dir(working_root, &slot);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }

    copy_tree(unit_dir, &staging)?;
    fs::rename(&staging, &target).map_err(|e| {
        Error::IoError(format!(
            "Failed to move {} to {}: {e}",
            staging.display(),
            target.display()
        ))
    })?;

    info!("Injected {} into {}", unit_dir.display(), target.display());
    Ok(SlotInjection { slot, copied: true })
}

fn staging_dir(working_root: &Path, slot: &Path) -> PathBuf {
    let parent = working_root.parent().unwrap_or(working_root);
    parent.join(format!(".inject-{}", slot.display()))
}

/// Recursively copy a directory tree
pub(crate) fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry =
            entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {e}", from.display())))?;
        let relative = entry.path().strip_prefix(from).map_err(|_| {
            Error::InvalidPath(format!("{} escaped {}", entry.path().display(), from.display()))
        })?;
        let dest = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest).map_err(|e| {
                Error::IoError(format!(
                    "Failed to copy {} to {}: {e}",
                    entry.path().display(),
                    dest.display()
                ))
            })?;
            debug!("Copied {}", dest.display());
        }
    }
    Ok(())
}
