// src/pipeline/rename.rs

//! Package rename
//!
//! The new package name is the original one plus a suffix, so the rebuilt
//! app installs beside the original. The original name is always read from
//! the pristine manifest; reading the working copy after a previous run
//! would append the suffix twice.

use crate::error::{Error, Result};
use crate::overlay::Overlay;
use crate::patch::{PatchOutcome, TextPatcher, TextRule};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::path::Path;
use tracing::info;

/// Android manifest, relative to the working tree
pub const ANDROID_MANIFEST: &str = "AndroidManifest.xml";

/// apktool build metadata
pub const APKTOOL_YML: &str = "apktool.yml";

/// Result of the rename stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameReport {
    pub original: String,
    pub renamed: String,
    pub manifest: PatchOutcome,
    pub apktool_yml: PatchOutcome,
}

/// `package` attribute of the manifest's root element
pub fn read_package_name(xml: &str, source: &Path) -> Result<String> {
    let xml_error = |reason: String| Error::Xml {
        path: source.to_path_buf(),
        reason,
    };

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                for attribute in element.attributes() {
                    let attribute = attribute.map_err(|e| xml_error(e.to_string()))?;
                    if attribute.key.as_ref() == b"package" {
                        let value = attribute
                            .unescape_value()
                            .map_err(|e| xml_error(e.to_string()))?;
                        return Ok(value.into_owned());
                    }
                }
                return Err(xml_error("root element has no package attribute".to_string()));
            }
            Ok(Event::Eof) => return Err(xml_error("no root element".to_string())),
            Err(e) => return Err(xml_error(e.to_string())),
            Ok(_) => {}
        }
    }
}

/// Append `suffix` to the package name in the manifest and apktool.yml
pub fn rename_package(overlay: &Overlay, suffix: &str) -> Result<RenameReport> {
    let manifest_xml = overlay.read_baseline_text(ANDROID_MANIFEST)?;
    let original = read_package_name(&manifest_xml, Path::new(ANDROID_MANIFEST))?;
    let renamed = format!("{original}{suffix}");

    let patcher = TextPatcher::new(overlay);
    let manifest = patcher.apply(ANDROID_MANIFEST, &[TextRule::literal(&original, &renamed)])?;
    let apktool_yml = patcher.apply(
        APKTOOL_YML,
        &[TextRule::pattern(
            r"(renameManifestPackage: )null",
            format!("${{1}}{}", renamed.replace('$', "$$")),
        )?],
    )?;

    info!("Package {} renamed to {}", original, renamed);
    Ok(RenameReport {
        original,
        renamed,
        manifest,
        apktool_yml,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="no"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.game.app">
    <provider android:authorities="com.game.app.files"/>
</manifest>
"#;

    fn setup() -> (tempfile::TempDir, Overlay) {
        let temp = tempfile::tempdir().unwrap();
        let overlay = Overlay::new(temp.path().join("decompiled"), temp.path().join("backup"));
        fs::create_dir_all(overlay.working_root()).unwrap();
        fs::write(overlay.working_root().join(ANDROID_MANIFEST), MANIFEST).unwrap();
        fs::write(
            overlay.working_root().join(APKTOOL_YML),
            "version: 2.9.3\nrenameManifestPackage: null\nsdkInfo:\n  minSdkVersion: 24\n",
        )
        .unwrap();
        (temp, overlay)
    }

    #[test]
    fn test_read_package_name() {
        assert_eq!(
            read_package_name(MANIFEST, Path::new(ANDROID_MANIFEST)).unwrap(),
            "com.game.app"
        );
        assert!(matches!(
            read_package_name("<manifest/>", Path::new(ANDROID_MANIFEST)),
            Err(Error::Xml { .. })
        ));
    }

    #[test]
    fn test_rename_package() {
        let (_temp, overlay) = setup();
        let report = rename_package(&overlay, ".mod").unwrap();

        assert_eq!(report.renamed, "com.game.app.mod");
        let manifest =
            fs::read_to_string(overlay.working_root().join(ANDROID_MANIFEST)).unwrap();
        assert!(manifest.contains(r#"package="com.game.app.mod""#));
        assert!(manifest.contains(r#"android:authorities="com.game.app.mod.files""#));
        let yml = fs::read_to_string(overlay.working_root().join(APKTOOL_YML)).unwrap();
        assert!(yml.contains("renameManifestPackage: com.game.app.mod\n"));
    }

    #[test]
    fn test_rename_twice_does_not_stack_suffix() {
        let (_temp, overlay) = setup();
        rename_package(&overlay, ".mod").unwrap();
        let again = rename_package(&overlay, ".mod").unwrap();

        assert_eq!(again.original, "com.game.app");
        assert_eq!(again.manifest, PatchOutcome::UpToDate);
        let manifest =
            fs::read_to_string(overlay.working_root().join(ANDROID_MANIFEST)).unwrap();
        assert!(!manifest.contains(".mod.mod"));
    }

    #[test]
    fn test_empty_suffix_leaves_manifest_unsnapshotted() {
        let (_temp, overlay) = setup();
        let report = rename_package(&overlay, "").unwrap();

        assert_eq!(report.manifest, PatchOutcome::Unchanged);
        assert!(!overlay.has_snapshot(ANDROID_MANIFEST).unwrap());
        assert_eq!(report.apktool_yml, PatchOutcome::Patched);
        assert!(overlay.has_snapshot(APKTOOL_YML).unwrap());
    }
}
