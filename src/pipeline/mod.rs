// src/pipeline/mod.rs

//! Resumable repackaging pipeline
//!
//! [`Pipeline`] owns the configuration, the tool resolver and the command
//! runner for one run and implements [`StageExecutor`] on top of them. The
//! stage order and checkpoint logic live in [`stages`]; the per-stage work
//! lives in the sibling modules.
//!
//! A run always starts from the first stage. Artifact stages whose output
//! already exists are skipped and patch stages re-apply from pristine
//! baselines, so re-running after a failure picks up where it stopped.

pub mod bypass;
pub mod endpoint;
pub mod external;
pub mod layout;
pub mod rename;
pub mod restyle;
pub mod stages;

pub use layout::WorkLayout;
pub use stages::{
    ArtifactProbe, Checkpoint, FsProbe, RunSummary, Stage, StageAction, StageExecutor,
    StageStatus, StageStep, resume_point, run_from, run_stage, stage_status,
};

use crate::config::RepackConfig;
use crate::error::{Error, Result};
use crate::overlay::Overlay;
use crate::tools::{
    CommandRunner, GithubReleases, Provenance, ShellRunner, ToolHandle, ToolKind, ToolResolver,
};
use external::remove_path;
use restyle::Restyler;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// One repackaging run over a work directory
pub struct Pipeline {
    config: RepackConfig,
    layout: WorkLayout,
    resolver: ToolResolver,
    runner: Box<dyn CommandRunner>,
}

impl Pipeline {
    /// Create a pipeline with the real resolver and shell runner
    ///
    /// The work directory is created if needed and made absolute, because
    /// tools run with it as their current directory.
    pub fn new(config: RepackConfig) -> Result<Self> {
        fs::create_dir_all(&config.work_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create work directory {}: {e}",
                config.work_dir.display()
            ))
        })?;
        let work_dir = fs::canonicalize(&config.work_dir)?;
        let config = config.with_work_dir(&work_dir);

        let resolver = ToolResolver::new(
            config.tool_specs(),
            config.java_command.clone(),
            &work_dir,
            Box::new(GithubReleases::new()?),
        );
        let runner = Box::new(ShellRunner::new(&work_dir));
        Ok(Self::with_parts(config, resolver, runner))
    }

    /// Assemble a pipeline from explicit parts
    pub fn with_parts(
        config: RepackConfig,
        resolver: ToolResolver,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        let layout = WorkLayout::new(&config.work_dir);
        Self {
            config,
            layout,
            resolver,
            runner,
        }
    }

    pub fn layout(&self) -> &WorkLayout {
        &self.layout
    }

    /// Overlay over the decompiled tree
    pub fn overlay(&self) -> Overlay {
        self.layout.overlay()
    }

    /// Run every stage, skipping those whose artifact exists
    pub fn run(&mut self) -> Result<RunSummary> {
        let layout = self.layout.clone();
        let summary = run_from(Stage::first(), &layout, &FsProbe, self)?;
        info!(
            "Done: {} ({} stages executed, {} skipped)",
            layout.signed_apk().display(),
            summary.executed.len(),
            summary.skipped.len()
        );
        Ok(summary)
    }

    /// Checkpoint state of every stage
    pub fn status(&self) -> Vec<StageStatus> {
        stage_status(&self.layout, &FsProbe)
    }

    /// Delete the artifacts of `stage` and every later stage
    ///
    /// Resetting the decompile stage or anything before it also discards the
    /// pristine snapshots, since they were taken from the tree being thrown
    /// away. Returns the paths that were removed.
    pub fn reset_from(&self, stage: Stage) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for later in Stage::all().iter().filter(|s| **s >= stage) {
            if let Some(artifact) = later.checkpoint(&self.layout).artifact() {
                for path in [artifact.to_path_buf(), self.layout.staging(artifact)] {
                    if remove_path(&path)? {
                        removed.push(path);
                    }
                }
            }
        }

        if stage <= Stage::Decompiled {
            let backup = self.layout.backup();
            if remove_path(&backup)? {
                removed.push(backup);
            }
        }

        info!("Reset from {}: removed {} paths", stage, removed.len());
        Ok(removed)
    }

    /// Resolve every tool, `None` for optional tools that are unavailable
    pub fn resolve_all(&mut self) -> Result<Vec<(ToolKind, Option<ToolHandle>)>> {
        ToolKind::all()
            .iter()
            .map(|kind| Ok((*kind, self.resolver.resolve(*kind)?)))
            .collect()
    }

    fn restyle(&mut self) -> Result<()> {
        if !self.config.restyle {
            info!("Restyling disabled, skipping.");
            return Ok(());
        }
        let Some(magick) = self.resolver.resolve(ToolKind::ImageMagick)? else {
            warn!("ImageMagick not found, skipping icon and title screen.");
            return Ok(());
        };
        let icon = self.config.resolve(&self.config.icon);
        if !icon.is_file() {
            warn!("{} not found, skipping icon and title screen.", icon.display());
            return Ok(());
        }

        let overlay = self.overlay();
        let scratch = self.layout.root().join("restyle.partial");
        Restyler::new(&overlay, &magick, scratch).restyle(self.runner.as_mut(), &icon)?;
        Ok(())
    }
}

impl StageExecutor for Pipeline {
    fn execute(&mut self, stage: Stage) -> Result<()> {
        match stage {
            Stage::ToolsResolved => {
                self.resolve_all()?;
            }
            Stage::Merged => {
                let apkeditor = self.resolver.require(ToolKind::ApkEditor)?;
                let input_dir = self.config.resolve(&self.config.input_dir);
                external::merge(self.runner.as_mut(), &apkeditor, &input_dir, &self.layout)?;
            }
            Stage::Decompiled => {
                let apktool = self.resolver.require(ToolKind::Apktool)?;
                external::decompile(self.runner.as_mut(), &apktool, &self.layout)?;
            }
            Stage::EndpointPatched => {
                endpoint::patch_endpoint(&self.overlay(), &self.config.replacement_url)?;
            }
            Stage::BypassInjected => {
                let unit_dir = self.config.resolve(&self.config.bypass.unit_dir);
                let report = bypass::inject_bypass(&self.overlay(), &unit_dir, &self.config.bypass)?;
                info!(
                    "Bypass in {}, {} call sites redirected",
                    report.injection.slot.display(),
                    report.rewrite.matched()
                );
            }
            Stage::Renamed => {
                rename::rename_package(&self.overlay(), &self.config.package_suffix)?;
            }
            Stage::Restyled => self.restyle()?,
            Stage::Rebuilt => {
                let apktool = self.resolver.require(ToolKind::Apktool)?;
                external::rebuild(self.runner.as_mut(), &apktool, &self.layout)?;
            }
            Stage::Signed => {
                let signer = self.resolver.require(ToolKind::Signer)?;
                if signer.provenance == Provenance::Builtin {
                    external::ensure_keystore(self.runner.as_mut(), &self.config)?;
                }
                external::sign(self.runner.as_mut(), &signer, &self.layout)?;
            }
        }
        Ok(())
    }
}
