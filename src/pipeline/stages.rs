// src/pipeline/stages.rs

//! Pipeline stages and checkpointed transitions
//!
//! Progress is never stored as state. Each stage names the artifact whose
//! existence proves it finished; [`run_stage`] consults an [`ArtifactProbe`]
//! for that artifact and either skips or executes, then reports the next
//! stage. Stages without an artifact are idempotent and run every time.

use super::layout::WorkLayout;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// External tools located for this run
    ToolsResolved,
    /// Split APK parts merged into one archive
    Merged,
    /// Archive decoded into the working tree
    Decompiled,
    /// Manifest endpoint and native library copies rewritten
    EndpointPatched,
    /// Bypass unit injected and call sites redirected
    BypassInjected,
    /// Package renamed
    Renamed,
    /// Icon and title screen replaced (optional)
    Restyled,
    /// Working tree rebuilt into an unsigned archive
    Rebuilt,
    /// Rebuilt archive signed
    Signed,
}

impl Stage {
    /// All stages in order
    pub fn all() -> &'static [Stage] {
        &[
            Self::ToolsResolved,
            Self::Merged,
            Self::Decompiled,
            Self::EndpointPatched,
            Self::BypassInjected,
            Self::Renamed,
            Self::Restyled,
            Self::Rebuilt,
            Self::Signed,
        ]
    }

    /// First stage of a run
    pub fn first() -> Stage {
        Self::ToolsResolved
    }

    /// Get the next stage after this one
    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::ToolsResolved => Some(Self::Merged),
            Self::Merged => Some(Self::Decompiled),
            Self::Decompiled => Some(Self::EndpointPatched),
            Self::EndpointPatched => Some(Self::BypassInjected),
            Self::BypassInjected => Some(Self::Renamed),
            Self::Renamed => Some(Self::Restyled),
            Self::Restyled => Some(Self::Rebuilt),
            Self::Rebuilt => Some(Self::Signed),
            Self::Signed => None,
        }
    }

    /// Machine name, as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToolsResolved => "tools-resolved",
            Self::Merged => "merged",
            Self::Decompiled => "decompiled",
            Self::EndpointPatched => "endpoint-patched",
            Self::BypassInjected => "bypass-injected",
            Self::Renamed => "renamed",
            Self::Restyled => "restyled",
            Self::Rebuilt => "rebuilt",
            Self::Signed => "signed",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::ToolsResolved => "Resolve external tools",
            Self::Merged => "Merge split APKs",
            Self::Decompiled => "Decompile APK",
            Self::EndpointPatched => "Change server URL",
            Self::BypassInjected => "Bypass signature verification",
            Self::Renamed => "Change package name",
            Self::Restyled => "Change icon and title screen",
            Self::Rebuilt => "Build APK",
            Self::Signed => "Sign APK",
        }
    }

    /// What proves this stage finished
    pub fn checkpoint(&self, layout: &WorkLayout) -> Checkpoint {
        match self {
            Self::Merged => Checkpoint::Artifact(layout.merged_apk()),
            Self::Decompiled => Checkpoint::Artifact(layout.decompiled()),
            Self::Rebuilt => Checkpoint::Artifact(layout.unsigned_apk()),
            Self::Signed => Checkpoint::Artifact(layout.signed_apk()),
            Self::ToolsResolved
            | Self::EndpointPatched
            | Self::BypassInjected
            | Self::Renamed
            | Self::Restyled => Checkpoint::Always,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|stage| stage.name() == s.trim().to_lowercase())
            .ok_or_else(|| {
                let names: Vec<&str> = Self::all().iter().map(|s| s.name()).collect();
                Error::Config(format!("unknown stage {:?} (expected one of: {})", s, names.join(", ")))
            })
    }
}

/// Completion witness of a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkpoint {
    /// The stage is complete iff this path exists
    Artifact(PathBuf),
    /// No artifact; the stage is idempotent and re-executed every run
    Always,
}

impl Checkpoint {
    /// Artifact path, if any
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            Self::Artifact(path) => Some(path),
            Self::Always => None,
        }
    }
}

/// Answers "does this artifact exist"
pub trait ArtifactProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl ArtifactProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

impl<F: Fn(&Path) -> bool> ArtifactProbe for F {
    fn exists(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Does the work of one stage
pub trait StageExecutor {
    fn execute(&mut self, stage: Stage) -> Result<()>;
}

/// What [`run_stage`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAction {
    /// Artifact already present
    Skipped,
    /// Executor ran
    Executed,
}

/// One transition of the pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStep {
    pub stage: Stage,
    pub action: StageAction,
    pub next: Option<Stage>,
}

/// Run a single stage unless its artifact already exists
///
/// An executor that returns success without producing the stage's artifact
/// is an error: the next run would otherwise redo the stage forever.
pub fn run_stage(
    stage: Stage,
    layout: &WorkLayout,
    probe: &dyn ArtifactProbe,
    executor: &mut dyn StageExecutor,
) -> Result<StageStep> {
    let checkpoint = stage.checkpoint(layout);

    if let Some(artifact) = checkpoint.artifact()
        && probe.exists(artifact)
    {
        info!(
            "{} already exists, skipping {} step.",
            artifact.display(),
            stage
        );
        return Ok(StageStep {
            stage,
            action: StageAction::Skipped,
            next: stage.next(),
        });
    }

    info!("{}...", stage.description());
    executor.execute(stage)?;

    if let Some(artifact) = checkpoint.artifact()
        && !probe.exists(artifact)
    {
        return Err(Error::MissingResource(format!(
            "{} finished without producing {}",
            stage,
            artifact.display()
        )));
    }

    Ok(StageStep {
        stage,
        action: StageAction::Executed,
        next: stage.next(),
    })
}

/// Stages executed and skipped by one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: Vec<Stage>,
    pub skipped: Vec<Stage>,
}

/// Drive the state machine from `first` to the end
pub fn run_from(
    first: Stage,
    layout: &WorkLayout,
    probe: &dyn ArtifactProbe,
    executor: &mut dyn StageExecutor,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let mut current = Some(first);
    while let Some(stage) = current {
        let step = run_stage(stage, layout, probe, executor)?;
        match step.action {
            StageAction::Executed => summary.executed.push(stage),
            StageAction::Skipped => summary.skipped.push(stage),
        }
        current = step.next;
    }
    Ok(summary)
}

/// Checkpoint state of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatus {
    pub stage: Stage,
    pub checkpoint: Checkpoint,
    /// `Some(exists)` for artifact stages, `None` for always-run stages
    pub complete: Option<bool>,
}

/// Checkpoint state of every stage
pub fn stage_status(layout: &WorkLayout, probe: &dyn ArtifactProbe) -> Vec<StageStatus> {
    Stage::all()
        .iter()
        .map(|stage| {
            let checkpoint = stage.checkpoint(layout);
            let complete = checkpoint.artifact().map(|p| probe.exists(p));
            StageStatus {
                stage: *stage,
                checkpoint,
                complete,
            }
        })
        .collect()
}

/// First artifact stage whose artifact is missing, where a re-run resumes
pub fn resume_point(layout: &WorkLayout, probe: &dyn ArtifactProbe) -> Option<Stage> {
    stage_status(layout, probe)
        .into_iter()
        .find(|status| status.complete == Some(false))
        .map(|status| status.stage)
}
