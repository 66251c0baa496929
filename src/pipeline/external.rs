// src/pipeline/external.rs

//! Stages delegated to external tools
//!
//! Every tool writes to a staging path next to the stage's artifact; the
//! staging output is renamed into place only after the tool exits cleanly.
//! A crashed or interrupted tool therefore never leaves something that
//! passes for a finished checkpoint.

use super::layout::WorkLayout;
use crate::config::RepackConfig;
use crate::error::{Error, Result};
use crate::tools::{CommandRunner, ToolHandle, quote_path};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Merge the split APK parts in `input_dir` into `merged.apk`
pub fn merge(
    runner: &mut dyn CommandRunner,
    apkeditor: &ToolHandle,
    input_dir: &Path,
    layout: &WorkLayout,
) -> Result<()> {
    if !input_dir.is_dir() {
        return Err(Error::MissingResource(format!(
            "split APK directory {}",
            input_dir.display()
        )));
    }
    produce(layout, &layout.merged_apk(), |staging| {
        runner.run(&apkeditor.invocation(&format!(
            "merge -i {} -o {}",
            quote_path(input_dir),
            quote_path(staging)
        )))
    })
}

/// Decode `merged.apk` into the working tree
pub fn decompile(runner: &mut dyn CommandRunner, apktool: &ToolHandle, layout: &WorkLayout) -> Result<()> {
    let merged = layout.merged_apk();
    produce(layout, &layout.decompiled(), |staging| {
        runner.run(&apktool.invocation(&format!(
            "decode {} -o {}",
            quote_path(&merged),
            quote_path(staging)
        )))
    })
}

/// Build the working tree into `unsigned.apk`
pub fn rebuild(runner: &mut dyn CommandRunner, apktool: &ToolHandle, layout: &WorkLayout) -> Result<()> {
    let decompiled = layout.decompiled();
    produce(layout, &layout.unsigned_apk(), |staging| {
        runner.run(&apktool.invocation(&format!(
            "build {} -o {}",
            quote_path(&decompiled),
            quote_path(staging)
        )))
    })
}

/// Sign a copy of `unsigned.apk` in place, publishing it as `modified.apk`
pub fn sign(runner: &mut dyn CommandRunner, signer: &ToolHandle, layout: &WorkLayout) -> Result<()> {
    let unsigned = layout.unsigned_apk();
    produce(layout, &layout.signed_apk(), |staging| {
        fs::copy(&unsigned, staging).map_err(|e| {
            Error::IoError(format!(
                "Failed to copy {} to {}: {e}",
                unsigned.display(),
                staging.display()
            ))
        })?;
        runner.run(&signer.invocation(&quote_path(staging)))
    })
}

/// Generate the built-in signer's keystore unless it exists
///
/// Returns `true` if a keystore was generated.
pub fn ensure_keystore(runner: &mut dyn CommandRunner, config: &RepackConfig) -> Result<bool> {
    let keystore = config.resolve(&config.keystore.path);
    if keystore.is_file() {
        debug!("Using keystore {}", keystore.display());
        return Ok(false);
    }

    info!("Generating keystore {}...", keystore.display());
    runner.run(&config.keystore_command())?;
    if !keystore.is_file() {
        return Err(Error::MissingResource(format!(
            "keytool did not create {}",
            keystore.display()
        )));
    }
    Ok(true)
}

/// Run `write` against the staging path of `artifact`, then move it into place
fn produce(
    layout: &WorkLayout,
    artifact: &Path,
    write: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    let staging = layout.staging(artifact);
    remove_path(&staging)?;

    write(&staging)?;

    if !staging.exists() {
        return Err(Error::MissingResource(format!(
            "{} was not produced",
            staging.display()
        )));
    }
    fs::rename(&staging, artifact).map_err(|e| {
        Error::IoError(format!(
            "Failed to move {} to {}: {e}",
            staging.display(),
            artifact.display()
        ))
    })?;
    info!("Created {}", artifact.display());
    Ok(())
}

/// Remove a file or directory tree if present
pub(crate) fn remove_path(path: &Path) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| Error::IoError(format!("Failed to remove {}: {e}", path.display())))?;
    debug!("Removed {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Provenance, ToolKind};

    /// Creates whatever follows `-o` or `-keystore` (else the last word)
    struct FakeTool {
        commands: Vec<String>,
        fail: bool,
    }

    impl CommandRunner for FakeTool {
        fn run(&mut self, command: &str) -> Result<()> {
            self.commands.push(command.to_string());
            let words: Vec<&str> = command.split(' ').collect();
            let output = words
                .iter()
                .position(|w| *w == "-o" || *w == "-keystore")
                .map(|i| words[i + 1])
                .unwrap_or_else(|| words[words.len() - 1]);
            if command.contains("decode") {
                fs::create_dir_all(output)?;
            } else if !Path::new(output).exists() {
                fs::write(output, b"PK")?;
            }
            if self.fail {
                return Err(Error::ExternalTool {
                    command: command.to_string(),
                    code: Some(1),
                });
            }
            Ok(())
        }
    }

    fn handle(kind: ToolKind, command: &str) -> ToolHandle {
        ToolHandle {
            kind,
            command: command.to_string(),
            provenance: Provenance::Installed,
        }
    }

    #[test]
    fn test_merge_requires_input_dir() {
        let temp = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(temp.path());
        let mut tool = FakeTool { commands: Vec::new(), fail: false };
        let err = merge(
            &mut tool,
            &handle(ToolKind::ApkEditor, "APKEditor"),
            &temp.path().join("apk"),
            &layout,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingResource(_)));
        assert!(tool.commands.is_empty());
    }

    #[test]
    fn test_merge_and_decompile_publish_artifacts() {
        let temp = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(temp.path());
        fs::create_dir(temp.path().join("apk")).unwrap();
        let mut tool = FakeTool { commands: Vec::new(), fail: false };

        merge(&mut tool, &handle(ToolKind::ApkEditor, "APKEditor"), &temp.path().join("apk"), &layout)
            .unwrap();
        assert!(layout.merged_apk().is_file());
        assert!(!layout.staging(&layout.merged_apk()).exists());
        assert!(tool.commands[0].starts_with("APKEditor merge -i "));

        fs::create_dir_all(layout.staging(&layout.decompiled()).join("stale")).unwrap();
        decompile(&mut tool, &handle(ToolKind::Apktool, "apktool"), &layout).unwrap();
        assert!(layout.decompiled().is_dir());
        assert!(!layout.decompiled().join("stale").exists());
    }

    #[test]
    fn test_failed_tool_leaves_no_artifact() {
        let temp = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(temp.path());
        fs::create_dir(layout.decompiled()).unwrap();
        let mut tool = FakeTool { commands: Vec::new(), fail: true };

        let err = rebuild(&mut tool, &handle(ToolKind::Apktool, "apktool"), &layout).unwrap_err();
        assert!(matches!(err, Error::ExternalTool { .. }));
        assert!(!layout.unsigned_apk().exists());
    }

    #[test]
    fn test_sign_keeps_unsigned_copy() {
        let temp = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(temp.path());
        fs::write(layout.unsigned_apk(), b"unsigned").unwrap();
        let mut tool = FakeTool { commands: Vec::new(), fail: false };

        sign(&mut tool, &handle(ToolKind::Signer, "apksigner sign"), &layout).unwrap();
        assert_eq!(fs::read(layout.signed_apk()).unwrap(), b"unsigned");
        assert!(layout.unsigned_apk().is_file());
        assert_eq!(
            tool.commands,
            vec![format!(
                "apksigner sign {}",
                layout.staging(&layout.signed_apk()).display()
            )]
        );
    }

    #[test]
    fn test_ensure_keystore_once() {
        let temp = tempfile::tempdir().unwrap();
        let config = RepackConfig::new().with_work_dir(temp.path());
        let mut tool = FakeTool { commands: Vec::new(), fail: false };

        assert!(ensure_keystore(&mut tool, &config).unwrap());
        assert!(tool.commands[0].starts_with("keytool -genkey"));
        assert!(!ensure_keystore(&mut tool, &config).unwrap());
        assert_eq!(tool.commands.len(), 1);
    }
}
