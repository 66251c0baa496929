// src/pipeline/endpoint.rs

//! Server endpoint rewrite
//!
//! The asset manifest names the download endpoint in its `packageUrl`
//! field, and native libraries carry the same string baked in. Libraries
//! record the string's length elsewhere, so the replacement must be exactly
//! as long as the original; that is checked before anything is written.

use crate::error::{Error, Result};
use crate::overlay::Overlay;
use crate::patch::{BinaryPatcher, ByteRule, PatchOutcome, TextPatcher, TextRule, ensure_same_length};
use crate::rewrite::glob_resources;
use std::path::PathBuf;
use tracing::info;

/// Asset manifests, relative to the working tree
pub const MANIFEST_GLOB: &str = "assets/*.manifest";

/// Native libraries that embed the endpoint
pub const NATIVE_LIB_GLOB: &str = "lib/**/*.so";

/// JSON field holding the endpoint
pub const ENDPOINT_FIELD: &str = "packageUrl";

/// What the endpoint rewrite touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReport {
    /// Manifest the endpoint was read from
    pub manifest: PathBuf,
    /// Endpoint found in the pristine manifest
    pub original: String,
    pub manifest_outcome: PatchOutcome,
    /// Outcome per native library
    pub libraries: Vec<(PathBuf, PatchOutcome)>,
}

/// Extract the endpoint field from manifest JSON
pub fn read_endpoint(manifest_json: &str) -> Result<String> {
    let manifest: serde_json::Value = serde_json::from_str(manifest_json)?;
    manifest
        .get(ENDPOINT_FIELD)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::MissingResource(format!("manifest has no string field {}", ENDPOINT_FIELD)))
}

/// Point the manifest and every native library at `replacement`
pub fn patch_endpoint(overlay: &Overlay, replacement: &str) -> Result<EndpointReport> {
    let manifest = glob_resources(overlay.working_root(), MANIFEST_GLOB)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            Error::MissingResource(format!(
                "no {} under {}",
                MANIFEST_GLOB,
                overlay.working_root().display()
            ))
        })?;

    let original = read_endpoint(&overlay.read_baseline_text(&manifest)?)?;
    ensure_same_length(ENDPOINT_FIELD, &original, replacement)?;

    let manifest_outcome =
        TextPatcher::new(overlay).apply(&manifest, &[TextRule::literal(&original, replacement)])?;

    let byte_rules = [ByteRule::fixed_width(original.as_bytes(), replacement.as_bytes())?];
    let patcher = BinaryPatcher::new(overlay);
    let mut libraries = Vec::new();
    for library in glob_resources(overlay.working_root(), NATIVE_LIB_GLOB)? {
        let outcome = patcher.apply(&library, &byte_rules)?;
        libraries.push((library, outcome));
    }

    let touched = libraries.iter().filter(|(_, o)| o.is_modified()).count();
    info!(
        "Endpoint {} -> {} ({} of {} native libraries carry it)",
        original,
        replacement,
        touched,
        libraries.len()
    );

    Ok(EndpointReport {
        manifest,
        original,
        manifest_outcome,
        libraries,
    })
}
