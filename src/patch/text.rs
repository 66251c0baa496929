// src/patch/text.rs

//! Text resource patcher

use super::{PatchOutcome, TextRule, commit};
use crate::error::Result;
use crate::overlay::Overlay;
use std::borrow::Cow;
use std::path::Path;

/// Applies [`TextRule`]s to UTF-8 resources
#[derive(Debug, Clone, Copy)]
pub struct TextPatcher<'a> {
    overlay: &'a Overlay,
}

impl<'a> TextPatcher<'a> {
    /// Create a patcher over the given overlay
    pub fn new(overlay: &'a Overlay) -> Self {
        Self { overlay }
    }

    /// Apply `rules` in order to the baseline of `resource`
    ///
    /// Each rule sees the output of the previous one.
    pub fn apply(&self, resource: impl AsRef<Path>, rules: &[TextRule]) -> Result<PatchOutcome> {
        let resource = resource.as_ref();
        let baseline = self.overlay.read_baseline_text(resource)?;

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

        commit(self.overlay, resource, baseline.as_bytes(), content.as_bytes())
    }
}
