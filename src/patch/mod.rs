// src/patch/mod.rs

//! Resource patchers
//!
//! A patcher takes a resource path and an ordered list of rules, evaluates
//! the rules against the resource's pristine baseline (never the working
//! copy) and commits the result through the [`Overlay`]:
//!
//! - result equals baseline: [`PatchOutcome::Unchanged`], nothing is written
//!   and no snapshot is taken
//! - result equals the current working copy: [`PatchOutcome::UpToDate`],
//!   a previous run already applied it
//! - otherwise: snapshot on first touch, then overwrite the working copy
//!
//! Evaluating against the baseline makes every patch idempotent: applying
//! the same rules twice leaves the same bytes as applying them once.

mod binary;
mod rule;
mod text;

pub use binary::BinaryPatcher;
pub use rule::{ByteRule, TextRule};
pub use text::TextPatcher;

use crate::error::{Error, Result};
use crate::overlay::Overlay;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Result of applying a rule set to one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The rules produce the baseline content; nothing written
    Unchanged,
    /// The working copy was overwritten with new content
    Patched,
    /// The working copy already holds the patched content; nothing written
    UpToDate,
}

impl PatchOutcome {
    /// Whether the working copy differs from pristine after this patch
    pub fn is_modified(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl std::fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Patched => write!(f, "patched"),
            Self::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Check that a fixed-width field keeps its length
///
/// Callers run this before any patcher is invoked, so a mismatch leaves the
/// working tree untouched. Lengths are compared in bytes, which is what the
/// binary containers record.
pub fn ensure_same_length(field: &str, original: &str, replacement: &str) -> Result<()> {
    if original.len() != replacement.len() {
        return Err(Error::invariant(format!(
            "{field} length mismatch: {} != {} ({:?} -> {:?})",
            original.len(),
            replacement.len(),
            original,
            replacement
        )));
    }
    Ok(())
}

/// Write `patched` as the working copy of `resource` if it differs
pub(crate) fn commit(
    overlay: &Overlay,
    resource: &Path,
    baseline: &[u8],
    patched: &[u8],
) -> Result<PatchOutcome> {
    if patched == baseline {
        debug!("No rule matched in {}", resource.display());
        return Ok(PatchOutcome::Unchanged);
    }

    let working = overlay.working_path(resource)?;
    if fs::read(&working).is_ok_and(|current| current == patched) {
        debug!("{} already patched", working.display());
        return Ok(PatchOutcome::UpToDate);
    }

    info!("Patching {}...", working.display());
    overlay.ensure_snapshotted(resource)?;
    fs::write(&working, patched)
        .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", working.display())))?;
    Ok(PatchOutcome::Patched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_length_accepts_equal() {
        assert!(ensure_same_length("packageUrl", "http://old.example/x", "http://new.example/y").is_ok());
    }

    #[test]
    fn test_same_length_rejects_shorter() {
        let err = ensure_same_length("packageUrl", "http://old.example/x", "http://new.example/")
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert!(err.to_string().contains("packageUrl length mismatch"));
    }

    #[test]
    fn test_outcome_flags() {
        assert!(!PatchOutcome::Unchanged.is_modified());
        assert!(PatchOutcome::UpToDate.is_modified());
        assert!(PatchOutcome::Patched.is_modified());
    }
}
