// src/patch/binary.rs

//! Binary resource patcher

use super::{ByteRule, PatchOutcome, commit};
use crate::error::Result;
use crate::overlay::Overlay;
use std::borrow::Cow;
use std::path::Path;

/// Applies literal [`ByteRule`]s to arbitrary resources
#[derive(Debug, Clone, Copy)]
pub struct BinaryPatcher<'a> {
    overlay: &'a Overlay,
}

impl<'a> BinaryPatcher<'a> {
    /// Create a patcher over the given overlay
    pub fn new(overlay: &'a Overlay) -> Self {
        Self { overlay }
    }

    /// Apply `rules` in order to the baseline of `resource`
    pub fn apply(&self, resource: impl AsRef<Path>, rules: &[ByteRule]) -> Result<PatchOutcome> {
        let resource = resource.as_ref();
        let baseline = self.overlay.read_baseline(resource)?;

        let mut content = baseline.clone();
        for rule in rules {
            let next = match rule.apply(&content) {
                Cow::Owned(replaced) => Some(replaced),
                Cow::Borrowed(_) => None,
            };
            if let Some(next) = next {
                content = next;
            }
        }

        commit(self.overlay, resource, &baseline, &content)
    }
}
