// src/pipeline/restyle.rs

//! Icon and title screen restyle
//!
//! ImageMagick renders each target from its pristine baseline into a scratch
//! directory outside the working tree. The rendered bytes are then committed
//! like any other patch, so a re-run that renders the same image writes
//! nothing.

use crate::error::{Error, Result};
use crate::overlay::Overlay;
use crate::patch::{PatchOutcome, commit};
use crate::tools::{CommandRunner, ToolHandle, quote_path};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Title screen sprite sheet the icon is composited onto
pub const TITLE_SPRITES: &str = "assets/Top/sprites.png";

/// Launcher icon, re-rendered at its original size
pub const LAUNCHER_ICON: &str = "res/drawable-xhdpi/icon.png";

const SPRITE_GEOMETRY: &str = "+1515+93";
const SPRITE_WIDTH: u32 = 47;
const SVG_DENSITY: u32 = 1000;

// Keeps repeated renders byte-identical
const PNG_DETERMINISM: &str = "-define png:exclude-chunk=date,time";

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Width and height from a PNG's IHDR chunk
pub fn png_size(data: &[u8]) -> Result<(u32, u32)> {
    if data.len() < 24 || !data.starts_with(PNG_SIGNATURE) || &data[12..16] != b"IHDR" {
        return Err(Error::invariant("image has no PNG IHDR header"));
    }
    let be = |range: std::ops::Range<usize>| {
        let mut word = [0u8; 4];
        word.copy_from_slice(&data[range]);
        u32::from_be_bytes(word)
    };
    Ok((be(16..20), be(20..24)))
}

/// Outcome of the restyle stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestyleReport {
    pub restyled: Vec<(PathBuf, PatchOutcome)>,
    /// Targets absent from this application
    pub missing: Vec<PathBuf>,
}

/// Renders restyled images with an ImageMagick invocation
pub struct Restyler<'a> {
    overlay: &'a Overlay,
    magick: &'a ToolHandle,
    scratch_dir: PathBuf,
}

impl<'a> Restyler<'a> {
    /// `scratch_dir` receives intermediate renders and must lie outside the
    /// working tree
    pub fn new(overlay: &'a Overlay, magick: &'a ToolHandle, scratch_dir: impl AsRef<Path>) -> Self {
        Self {
            overlay,
            magick,
            scratch_dir: scratch_dir.as_ref().to_path_buf(),
        }
    }

    /// Restyle the sprite sheet and launcher icon from `icon_svg`
    ///
    /// The scratch directory is removed on every exit path.
    pub fn restyle(&self, runner: &mut dyn CommandRunner, icon_svg: &Path) -> Result<RestyleReport> {
        fs::create_dir_all(&self.scratch_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create directory {}: {e}",
                self.scratch_dir.display()
            ))
        })?;

        let result = self.restyle_targets(runner, icon_svg);
        if let Err(e) = fs::remove_dir_all(&self.scratch_dir) {
            warn!("Failed to remove {}: {e}", self.scratch_dir.display());
        }
        result
    }

    fn restyle_targets(&self, runner: &mut dyn CommandRunner, icon_svg: &Path) -> Result<RestyleReport> {
        let svg = quote_path(icon_svg);
        let mut report = RestyleReport::default();

        for resource in [TITLE_SPRITES, LAUNCHER_ICON] {
            if !self.overlay.working_path(resource)?.is_file() {
                warn!("{} not found, not restyling it", resource);
                report.missing.push(PathBuf::from(resource));
                continue;
            }

            let baseline = self.overlay.baseline_path(resource)?;
            let args = if resource == TITLE_SPRITES {
                format!(
                    r"{} \( -background none -density {} {} -resize {}x \) -geometry {} -compose over -composite",
                    quote_path(&baseline),
                    SVG_DENSITY,
                    svg,
                    SPRITE_WIDTH,
                    SPRITE_GEOMETRY
                )
            } else {
                let (width, height) = png_size(&self.overlay.read_baseline(resource)?)?;
                format!(
                    "-background none -density {} {} -resize {}x{}",
                    SVG_DENSITY, svg, width, height
                )
            };

            let outcome = self.render(runner, resource, &args)?;
            report.restyled.push((PathBuf::from(resource), outcome));
        }

        Ok(report)
    }

    fn render(&self, runner: &mut dyn CommandRunner, resource: &str, args: &str) -> Result<PatchOutcome> {
        let file_name = Path::new(resource)
            .file_name()
            .ok_or_else(|| Error::InvalidPath(resource.to_string()))?;
        let output = self.scratch_dir.join(file_name);
        if output.exists() {
            fs::remove_file(&output)?;
        }

        runner.run(&self.magick.invocation(&format!(
            "{} {} {}",
            args,
            PNG_DETERMINISM,
            quote_path(&output)
        )))?;

        let rendered = fs::read(&output).map_err(|e| {
            Error::MissingResource(format!("{} was not rendered: {e}", output.display()))
        })?;
        let baseline = self.overlay.read_baseline(resource)?;
        let outcome = commit(self.overlay, Path::new(resource), &baseline, &rendered)?;
        info!("{} {}", resource, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Provenance, ToolKind};

    fn png(width: u32, height: u32, tail: &[u8]) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data.extend_from_slice(tail);
        data
    }

    /// Writes a fixed image to the last word of every command
    #[derive(Default)]
    struct FakeMagick {
        commands: Vec<String>,
        fail: bool,
    }

    impl CommandRunner for FakeMagick {
        fn run(&mut self, command: &str) -> Result<()> {
            self.commands.push(command.to_string());
            if self.fail {
                return Err(Error::ExternalTool {
                    command: command.to_string(),
                    code: Some(1),
                });
            }
            let output = command.rsplit(' ').next().unwrap_or_default();
            fs::write(output, png(1, 1, b"rendered"))?;
            Ok(())
        }
    }

    fn magick() -> ToolHandle {
        ToolHandle {
            kind: ToolKind::ImageMagick,
            command: "magick".to_string(),
            provenance: Provenance::Installed,
        }
    }

    #[test]
    fn test_png_size() {
        assert_eq!(png_size(&png(96, 72, b"")).unwrap(), (96, 72));
        assert!(png_size(b"GIF89a").is_err());
        assert!(png_size(&png(1, 1, b"")[..20]).is_err());
    }

    #[test]
    fn test_restyle_renders_from_baseline() {
        let temp = tempfile::tempdir().unwrap();
        let overlay = Overlay::new(temp.path().join("decompiled"), temp.path().join("backup"));
        let root = overlay.working_root();
        fs::create_dir_all(root.join("res/drawable-xhdpi")).unwrap();
        fs::write(root.join(LAUNCHER_ICON), png(96, 96, b"original")).unwrap();

        let tool = magick();
        let restyler = Restyler::new(&overlay, &tool, temp.path().join("restyle.partial"));
        let mut runner = FakeMagick::default();
        let icon = temp.path().join("icon.svg");

        let report = restyler.restyle(&mut runner, &icon).unwrap();
        assert_eq!(report.missing, vec![PathBuf::from(TITLE_SPRITES)]);
        assert_eq!(
            report.restyled,
            vec![(PathBuf::from(LAUNCHER_ICON), PatchOutcome::Patched)]
        );
        assert_eq!(runner.commands.len(), 1);
        assert!(runner.commands[0].contains("-resize 96x96"));
        assert_eq!(overlay.read_baseline(LAUNCHER_ICON).unwrap(), png(96, 96, b"original"));

        let again = restyler.restyle(&mut runner, &icon).unwrap();
        assert_eq!(again.restyled[0].1, PatchOutcome::UpToDate);
        assert!(runner.commands[1].contains("-resize 96x96"));
    }

    #[test]
    fn test_sprite_composited_at_offset() {
        let temp = tempfile::tempdir().unwrap();
        let overlay = Overlay::new(temp.path().join("decompiled"), temp.path().join("backup"));
        fs::create_dir_all(overlay.working_root().join("assets/Top")).unwrap();
        fs::write(overlay.working_root().join(TITLE_SPRITES), png(2048, 1024, b"")).unwrap();

        let tool = magick();
        let restyler = Restyler::new(&overlay, &tool, temp.path().join("restyle.partial"));
        let mut runner = FakeMagick::default();
        restyler.restyle(&mut runner, Path::new("icon.svg")).unwrap();

        let command = &runner.commands[0];
        assert!(command.starts_with("magick "));
        assert!(command.contains("-resize 47x"));
        assert!(command.contains("-geometry +1515+93 -compose over -composite"));
    }

    #[test]
    fn test_scratch_dir_removed_after_failed_render() {
        let temp = tempfile::tempdir().unwrap();
        let overlay = Overlay::new(temp.path().join("decompiled"), temp.path().join("backup"));
        fs::create_dir_all(overlay.working_root().join("assets/Top")).unwrap();
        fs::write(overlay.working_root().join(TITLE_SPRITES), png(2048, 1024, b"")).unwrap();

        let tool = magick();
        let scratch = temp.path().join("restyle.partial");
        let restyler = Restyler::new(&overlay, &tool, &scratch);
        let mut runner = FakeMagick { fail: true, ..Default::default() };

        let err = restyler.restyle(&mut runner, Path::new("icon.svg")).unwrap_err();
        assert!(matches!(err, Error::ExternalTool { .. }));
        assert!(!scratch.exists());
        assert!(!overlay.has_snapshot(TITLE_SPRITES).unwrap());
    }

    #[test]
    fn test_scratch_dir_removed_after_success() {
        let temp = tempfile::tempdir().unwrap();
        let overlay = Overlay::new(temp.path().join("decompiled"), temp.path().join("backup"));
        fs::create_dir_all(overlay.working_root().join("res/drawable-xhdpi")).unwrap();
        fs::write(overlay.working_root().join(LAUNCHER_ICON), png(48, 48, b"")).unwrap();

        let tool = magick();
        let scratch = temp.path().join("restyle.partial");
        Restyler::new(&overlay, &tool, &scratch)
            .restyle(&mut FakeMagick::default(), Path::new("icon.svg"))
            .unwrap();
        assert!(!scratch.exists());
    }
}
