// src/pipeline/bypass.rs

//! Signature verification bypass
//!
//! A pre-built smali unit providing a static replacement for
//! `SigningInfo.getApkContentsSigners()` is copied into a fresh
//! `smali_classesN` slot, then every virtual call to the framework method is
//! redirected to it. The receiver register list is carried over verbatim.

use crate::config::BypassConfig;
use crate::error::Result;
use crate::overlay::Overlay;
use crate::patch::TextRule;
use crate::rewrite::{RewriteReport, SlotInjection, SlotScheme, StructuralRewriter, inject_unit};
use std::path::Path;

/// Class files of every dex slot
pub const SMALI_GLOB: &str = "smali*/**/*.smali";

/// Secondary dex slots are `smali_classes2`, `smali_classes3`, ...
pub const SLOT_PREFIX: &str = "smali_classes";

const FIRST_SLOT: usize = 2;

const SIGNERS_CALL: &str = r"invoke-virtual \{(.*)\}, Landroid/content/pm/SigningInfo;->getApkContentsSigners\(\)\[Landroid/content/pm/Signature;";

/// Result of the bypass stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassReport {
    pub injection: SlotInjection,
    pub rewrite: RewriteReport,
}

/// Rule redirecting the signer query to `bypass_class`
pub fn call_site_rule(bypass_class: &str) -> Result<TextRule> {
    let replacement = format!(
        "invoke-static {{${{1}}}}, {}->getApkContentsSigners(Landroid/content/pm/SigningInfo;)[Landroid/content/pm/Signature;",
        bypass_class.replace('$', "$$")
    );
    TextRule::pattern(SIGNERS_CALL, replacement)
}

/// Inject the bypass unit and redirect every call site
pub fn inject_bypass(overlay: &Overlay, unit_dir: &Path, bypass: &BypassConfig) -> Result<BypassReport> {
    let rule = call_site_rule(&bypass.class)?;
    let injection = inject_unit(
        overlay.working_root(),
        unit_dir,
        &SlotScheme::new(SLOT_PREFIX, FIRST_SLOT),
        &bypass.marker,
    )?;
    let rewrite = StructuralRewriter::new(overlay).rewrite_all(SMALI_GLOB, &rule)?;
    Ok(BypassReport { injection, rewrite })
}
